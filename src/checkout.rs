// src/checkout.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::api_client::StorefrontApi;
use crate::auth::CartContext;
use crate::config::ClearCartPolicy;
use crate::errors::AppError;
use crate::models::{OrderConfirmation, PaymentMethod};
use crate::wizard::{OrderWizard, WizardStep};

pub type WizardHandle = Arc<Mutex<OrderWizard>>;

pub const ORDER_SUCCESS_MESSAGE: &str = "Zamówienie zostało złożone!";
pub const ORDER_FAILURE_MESSAGE: &str = "Nie udało się złożyć zamówienia. Spróbuj ponownie.";
pub const CART_CHANGED_MESSAGE: &str = "Koszyk się zmienił, wybierz napoje dla nowych sztuk.";

/// Wysyła zamówienie z sesji kreatora.
///
/// Kolejność jest ważna: najpierw walidacja danych klienta (bez sieci),
/// potem świeży stan koszyka i sprawdzenie przypisań, dopiero na końcu
/// jedno żądanie checkout. Przy błędzie stan kreatora zostaje bez zmian,
/// żeby użytkownik mógł ręcznie ponowić próbę. Nie ma automatycznych
/// ponowień ani klucza idempotencji.
pub async fn submit_order(
    api: &dyn StorefrontApi,
    wizard: &mut OrderWizard,
    payment_method: PaymentMethod,
) -> Result<OrderConfirmation, AppError> {
    // Krok 1: walidacja bez dotykania sieci (krok, dane klienta, przypisania)
    if let Err(e) = wizard.build_order_request(payment_method) {
        tracing::warn!("Sesja {}: zamówienie odrzucone przed wysłaniem: {}", wizard.id(), e);
        return Err(e);
    }

    // Krok 2: koszyk mógł się zmienić w innej karcie
    let fresh_cart = api.get_cart(wizard.cart_context()).await?;
    wizard.refresh_cart(Arc::new(fresh_cart))?;
    if wizard.step() != WizardStep::Review {
        return Err(AppError::Conflict(CART_CHANGED_MESSAGE.to_string()));
    }

    // Krok 3: pełna walidacja i budowa payloadu
    let order_request = wizard.build_order_request(payment_method)?;

    // Krok 4: jedno żądanie do API
    let response = match api.checkout(wizard.cart_context(), &order_request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Sesja {}: checkout nie powiódł się: {}", wizard.id(), e);
            return Err(match e {
                AppError::UpstreamStatus { status, .. } if status >= 500 => {
                    AppError::UpstreamStatus {
                        status,
                        message: ORDER_FAILURE_MESSAGE.to_string(),
                    }
                }
                other => other,
            });
        }
    };

    let confirmation = OrderConfirmation::from(response);
    wizard.mark_submitted(confirmation.clone())?;
    Ok(confirmation)
}

/// Czyści koszyk z limitem czasu.
pub async fn clear_cart_with_timeout(
    api: &dyn StorefrontApi,
    ctx: &CartContext,
    timeout: Duration,
) -> Result<(), AppError> {
    match tokio::time::timeout(timeout, api.clear_cart(ctx)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!(
            "Czyszczenie koszyka trwało dłużej niż {} s.",
            timeout.as_secs_f32()
        ))),
    }
}

/// Etap dostawy: czyści koszyk i dopiero po odpowiedzi przechodzi do podziękowania.
///
/// Przy `BestEffort` błąd jest tylko logowany i kreator idzie dalej.
/// Przy `Required` błąd trafia do sesji, a kreator czeka na ręczne ponowienie.
pub async fn run_delivery_stage(
    api: Arc<dyn StorefrontApi>,
    session: WizardHandle,
    policy: ClearCartPolicy,
    timeout: Duration,
) -> Result<(), AppError> {
    let (session_id, ctx) = {
        let wizard = session.lock().await;
        (wizard.id(), wizard.cart_context().clone())
    };

    tracing::info!(
        "Sesja {}: czyszczenie koszyka ({})",
        session_id,
        if ctx.is_account() { "konto" } else { "gość" }
    );

    // Blokada sesji nie jest trzymana w trakcie żądania
    let result = clear_cart_with_timeout(api.as_ref(), &ctx, timeout).await;

    let mut wizard = session.lock().await;
    match result {
        Ok(()) => {
            wizard.complete_delivery(true)?;
            Ok(())
        }
        Err(e) => match policy {
            ClearCartPolicy::BestEffort => {
                tracing::warn!(
                    "Sesja {}: nie udało się wyczyścić koszyka, kontynuuję: {}",
                    session_id,
                    e
                );
                wizard.complete_delivery(false)?;
                Ok(())
            }
            ClearCartPolicy::Required => {
                tracing::error!(
                    "Sesja {}: nie udało się wyczyścić koszyka: {}",
                    session_id,
                    e
                );
                wizard.record_delivery_failure(e.user_message())?;
                Err(e)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart_utils::resolve_assignment;
    use crate::models::CustomerInfoPatch;
    use crate::test_support::{
        FakeApi, guest_context, sample_cafes, sample_cart, valid_customer_patch,
    };
    use crate::wizard::DeliveryStatus;
    use std::sync::atomic::Ordering;

    fn wizard_at_review(api: &FakeApi) -> OrderWizard {
        let cart = api.cart.lock().unwrap().clone();
        let mut wizard = OrderWizard::new(Arc::new(cart), guest_context(), None);
        let assignment = resolve_assignment(&sample_cafes(), "cafe-1", "latte").unwrap();
        for unit in wizard.units() {
            wizard.assign(&unit.unit_id, assignment.clone()).unwrap();
        }
        wizard.advance().unwrap();
        wizard.update_customer(valid_customer_patch()).unwrap();
        wizard.advance().unwrap();
        wizard
    }

    #[tokio::test]
    async fn successful_submission_moves_to_delivery() {
        let api = FakeApi::new(sample_cart(&[("p1", 2)]));
        let mut wizard = wizard_at_review(&api);

        let confirmation = submit_order(&api, &mut wizard, PaymentMethod::Card)
            .await
            .unwrap();

        assert_eq!(confirmation.order_id.as_deref(), Some("order-1"));
        assert_eq!(wizard.step(), WizardStep::DeliveryInProgress);
        assert_eq!(api.checkout_count(), 1);
        let order = api.last_order.lock().unwrap().clone().unwrap();
        assert_eq!(order.payment_method, PaymentMethod::Card);
        assert_eq!(order.selections.len(), 2);
    }

    #[tokio::test]
    async fn missing_phone_never_reaches_the_network() {
        let api = FakeApi::new(sample_cart(&[("p1", 1)]));
        let mut wizard = wizard_at_review(&api);
        wizard
            .update_customer(CustomerInfoPatch {
                phone: Some(String::new()),
                ..Default::default()
            })
            .unwrap();

        let err = submit_order(&api, &mut wizard, PaymentMethod::Cash)
            .await
            .unwrap_err();

        match err {
            AppError::FieldValidation(errors) => assert!(errors.contains_key("phone")),
            other => panic!("Oczekiwano FieldValidation, otrzymano {:?}", other),
        }
        assert_eq!(api.checkout_count(), 0);
        assert_eq!(wizard.step(), WizardStep::Review);
    }

    #[tokio::test]
    async fn failed_checkout_leaves_state_for_manual_retry() {
        let api = FakeApi::new(sample_cart(&[("p1", 1)]));
        let mut wizard = wizard_at_review(&api);
        api.fail_checkout.store(true, Ordering::SeqCst);

        let err = submit_order(&api, &mut wizard, PaymentMethod::Cash)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), ORDER_FAILURE_MESSAGE);
        assert_eq!(wizard.step(), WizardStep::Review);
        assert_eq!(wizard.customer().phone, "01012345678");

        api.fail_checkout.store(false, Ordering::SeqCst);
        submit_order(&api, &mut wizard, PaymentMethod::Cash)
            .await
            .unwrap();
        assert_eq!(api.checkout_count(), 2);
    }

    #[tokio::test]
    async fn cart_growing_in_another_tab_blocks_submission() {
        let api = FakeApi::new(sample_cart(&[("p1", 1)]));
        let mut wizard = wizard_at_review(&api);
        *api.cart.lock().unwrap() = sample_cart(&[("p1", 2)]);

        let err = submit_order(&api, &mut wizard, PaymentMethod::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.user_message(), CART_CHANGED_MESSAGE);
        assert_eq!(wizard.step(), WizardStep::SelectDrinks);
        assert_eq!(api.checkout_count(), 0);
    }

    #[tokio::test]
    async fn cart_emptied_in_another_tab_blocks_submission() {
        let api = FakeApi::new(sample_cart(&[("p1", 1)]));
        let mut wizard = wizard_at_review(&api);
        *api.cart.lock().unwrap() = sample_cart(&[]);

        let err = submit_order(&api, &mut wizard, PaymentMethod::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnprocessableEntity(_)));
        assert_eq!(err.user_message(), "Koszyk jest pusty.");
        assert_eq!(api.checkout_count(), 0);
        assert!(api.last_order.lock().unwrap().is_none());
    }

    async fn submitted_session(api: &FakeApi) -> WizardHandle {
        let mut wizard = wizard_at_review(api);
        submit_order(api, &mut wizard, PaymentMethod::Cash)
            .await
            .unwrap();
        Arc::new(Mutex::new(wizard))
    }

    #[tokio::test]
    async fn delivery_stage_finishes_after_cart_is_cleared() {
        let api = Arc::new(FakeApi::new(sample_cart(&[("p1", 1)])));
        let session = submitted_session(&api).await;

        run_delivery_stage(
            api.clone(),
            session.clone(),
            ClearCartPolicy::Required,
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        let wizard = session.lock().await;
        assert_eq!(wizard.step(), WizardStep::ThankYou);
        assert_eq!(
            wizard.delivery(),
            &DeliveryStatus::Finished { cart_cleared: true }
        );
        assert!(api.cart.lock().unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn best_effort_policy_continues_after_failure() {
        let api = Arc::new(FakeApi::new(sample_cart(&[("p1", 1)])));
        api.fail_clear.store(true, Ordering::SeqCst);
        let session = submitted_session(&api).await;

        run_delivery_stage(
            api.clone(),
            session.clone(),
            ClearCartPolicy::BestEffort,
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        let wizard = session.lock().await;
        assert_eq!(wizard.step(), WizardStep::ThankYou);
        assert_eq!(
            wizard.delivery(),
            &DeliveryStatus::Finished {
                cart_cleared: false
            }
        );
    }

    #[tokio::test]
    async fn required_policy_surfaces_timeout_and_allows_retry() {
        let api = Arc::new(
            FakeApi::new(sample_cart(&[("p1", 1)])).with_clear_delay(Duration::from_millis(200)),
        );
        let session = submitted_session(&api).await;

        let err = run_delivery_stage(
            api.clone(),
            session.clone(),
            ClearCartPolicy::Required,
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));

        {
            let mut wizard = session.lock().await;
            assert_eq!(wizard.step(), WizardStep::DeliveryInProgress);
            assert!(matches!(wizard.delivery(), DeliveryStatus::Failed { .. }));
            wizard.restart_delivery().unwrap();
        }

        run_delivery_stage(
            api.clone(),
            session.clone(),
            ClearCartPolicy::Required,
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        assert_eq!(session.lock().await.step(), WizardStep::ThankYou);
        assert_eq!(api.clear_count(), 2);
    }
}
