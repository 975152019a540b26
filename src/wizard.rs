// src/wizard.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{Display, EnumIter};
use uuid::Uuid;

use crate::auth::CartContext;
use crate::cart_utils::{
    CartExpansion, DrinkAssignment, DrinkSelectionMap, ExpandedCartUnit, all_assigned,
    selections_in_unit_order, unassigned_units,
};
use crate::errors::AppError;
use crate::models::{
    Cart, CustomerInfo, CustomerInfoPatch, DeliveryMethod, OrderConfirmation, OrderRequest,
    PaymentMethod,
};
use crate::validation::{FieldErrors, apply_patch, normalize_phone, validate_customer_info};

/// Adres wysyłany przy odbiorze osobistym.
pub const PICKUP_ADDRESS: &str = "Odbiór osobisty w kawiarni";

/// Kroki kreatora zamówienia, w kolejności.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumIter)]
#[serde(rename_all = "camelCase")]
pub enum WizardStep {
    SelectDrinks,
    ConfirmInfo,
    Review,
    DeliveryInProgress,
    ThankYou,
}

impl WizardStep {
    pub fn index(self) -> usize {
        match self {
            WizardStep::SelectDrinks => 0,
            WizardStep::ConfirmInfo => 1,
            WizardStep::Review => 2,
            WizardStep::DeliveryInProgress => 3,
            WizardStep::ThankYou => 4,
        }
    }

    /// Czy zamówienie zostało już wysłane.
    pub fn is_submitted(self) -> bool {
        matches!(self, WizardStep::DeliveryInProgress | WizardStep::ThankYou)
    }
}

/// Stan etapu dostawy (czyszczenie koszyka po złożeniu zamówienia).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum DeliveryStatus {
    NotStarted,
    InProgress,
    Failed { message: String },
    Finished { cart_cleared: bool },
}

/// Jedna sesja kreatora: wybrane napoje, dane klienta i aktualny krok.
#[derive(Debug)]
pub struct OrderWizard {
    id: Uuid,
    step: WizardStep,
    cart_context: CartContext,
    has_account: bool,
    expansion: CartExpansion,
    selections: DrinkSelectionMap,
    active_unit: Option<String>,
    customer: CustomerInfo,
    field_errors: FieldErrors,
    payment_method: PaymentMethod,
    confirmation: Option<OrderConfirmation>,
    delivery: DeliveryStatus,
    created_at: DateTime<Utc>,
}

/// Widok sesji zwracany do frontu.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub id: Uuid,
    pub step: WizardStep,
    pub step_index: usize,
    pub cart_id: String,
    pub has_account: bool,
    pub units: Vec<ExpandedCartUnit>,
    pub active_unit: Option<String>,
    pub all_assigned: bool,
    pub missing_units: Vec<String>,
    pub customer: CustomerInfo,
    pub field_errors: FieldErrors,
    pub payment_method: PaymentMethod,
    pub total_price: i64,
    pub confirmation: Option<OrderConfirmation>,
    pub delivery: DeliveryStatus,
    pub created_at: DateTime<Utc>,
}

impl OrderWizard {
    pub fn new(cart: Arc<Cart>, cart_context: CartContext, prefill: Option<CustomerInfo>) -> Self {
        let has_account = cart_context.is_account();
        let wizard = OrderWizard {
            id: Uuid::new_v4(),
            step: WizardStep::SelectDrinks,
            cart_context,
            has_account,
            expansion: CartExpansion::new(cart),
            selections: DrinkSelectionMap::new(),
            active_unit: None,
            customer: prefill.unwrap_or_default(),
            field_errors: FieldErrors::new(),
            payment_method: PaymentMethod::default(),
            confirmation: None,
            delivery: DeliveryStatus::NotStarted,
            created_at: Utc::now(),
        };
        tracing::info!(
            "Nowa sesja kreatora {} dla koszyka {} ({} sztuk)",
            wizard.id,
            wizard.expansion.cart().cart_id,
            wizard.expansion.units().len()
        );
        wizard
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn cart_context(&self) -> &CartContext {
        &self.cart_context
    }

    pub fn customer(&self) -> &CustomerInfo {
        &self.customer
    }

    pub fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    pub fn delivery(&self) -> &DeliveryStatus {
        &self.delivery
    }

    pub fn units(&self) -> Vec<ExpandedCartUnit> {
        self.expansion.with_selections(&self.selections)
    }

    pub fn all_assigned(&self) -> bool {
        all_assigned(self.expansion.units(), &self.selections)
    }

    fn illegal(&self, action: &'static str) -> AppError {
        tracing::warn!(
            "Sesja {}: niedozwolone '{}' w kroku {}",
            self.id,
            action,
            self.step
        );
        AppError::IllegalTransition {
            from: self.step,
            action,
        }
    }

    fn require_step(&self, allowed: &[WizardStep], action: &'static str) -> Result<(), AppError> {
        if allowed.contains(&self.step) {
            Ok(())
        } else {
            Err(self.illegal(action))
        }
    }

    fn require_unit(&self, unit_id: &str) -> Result<(), AppError> {
        if self.expansion.contains(unit_id) {
            Ok(())
        } else {
            tracing::warn!("Sesja {}: brak sztuki {}", self.id, unit_id);
            Err(AppError::NotFound)
        }
    }

    // --- KROK 0: wybór napojów ---

    /// Otwiera wybór napoju dla innej sztuki (krok 0 wraca sam do siebie).
    pub fn open_unit(&mut self, unit_id: &str) -> Result<(), AppError> {
        self.require_step(&[WizardStep::SelectDrinks], "open_unit")?;
        self.require_unit(unit_id)?;
        self.active_unit = Some(unit_id.to_string());
        Ok(())
    }

    pub fn assign(&mut self, unit_id: &str, assignment: DrinkAssignment) -> Result<(), AppError> {
        self.require_step(&[WizardStep::SelectDrinks], "assign")?;
        self.require_unit(unit_id)?;
        tracing::debug!(
            "Sesja {}: sztuka {} -> {} z {}",
            self.id,
            unit_id,
            assignment.drink.name,
            assignment.cafe.name
        );
        self.selections.insert(unit_id.to_string(), assignment);
        if self.active_unit.as_deref() == Some(unit_id) {
            self.active_unit = None;
        }
        Ok(())
    }

    pub fn unassign(&mut self, unit_id: &str) -> Result<(), AppError> {
        self.require_step(&[WizardStep::SelectDrinks], "unassign")?;
        self.require_unit(unit_id)?;
        self.selections.remove(unit_id);
        Ok(())
    }

    /// Podmienia migawkę koszyka. Wybory dla sztuk, które zniknęły z koszyka,
    /// przepadają; jeśli czegoś brakuje, kreator wraca do wyboru napojów.
    pub fn refresh_cart(&mut self, cart: Arc<Cart>) -> Result<(), AppError> {
        if self.step.is_submitted() {
            return Err(self.illegal("refresh_cart"));
        }
        if !self.expansion.refresh(cart) {
            return Ok(());
        }
        let dropped = self.expansion.prune_selections(&mut self.selections);
        if dropped > 0 {
            tracing::info!(
                "Sesja {}: koszyk się zmienił, usunięto {} wyborów",
                self.id,
                dropped
            );
        }
        if self
            .active_unit
            .as_deref()
            .is_some_and(|unit_id| !self.expansion.contains(unit_id))
        {
            self.active_unit = None;
        }
        if !self.all_assigned() && self.step != WizardStep::SelectDrinks {
            tracing::info!(
                "Sesja {}: nowe sztuki w koszyku, powrót do wyboru napojów",
                self.id
            );
            self.step = WizardStep::SelectDrinks;
        }
        Ok(())
    }

    // --- KROK 1: dane klienta ---

    /// Zmienia pola formularza. Błąd edytowanego pola znika od razu,
    /// pełna walidacja odbywa się dopiero przy przejściu dalej.
    pub fn update_customer(&mut self, patch: CustomerInfoPatch) -> Result<(), AppError> {
        self.require_step(
            &[WizardStep::ConfirmInfo, WizardStep::Review],
            "update_customer",
        )?;
        for field in apply_patch(&mut self.customer, patch) {
            self.field_errors.remove(field);
        }
        Ok(())
    }

    pub fn validate_customer(&self) -> FieldErrors {
        validate_customer_info(&self.customer, self.has_account)
    }

    // --- PRZEJŚCIA ---

    pub fn advance(&mut self) -> Result<WizardStep, AppError> {
        match self.step {
            WizardStep::SelectDrinks => {
                let missing = unassigned_units(self.expansion.units(), &self.selections);
                if !missing.is_empty() {
                    tracing::info!(
                        "Sesja {}: brak wyboru dla {} sztuk",
                        self.id,
                        missing.len()
                    );
                    return Err(AppError::UnprocessableEntity(format!(
                        "Wybierz napój i kawiarnię dla każdej sztuki (brakuje: {}).",
                        missing.len()
                    )));
                }
                self.active_unit = None;
                self.step = WizardStep::ConfirmInfo;
            }
            WizardStep::ConfirmInfo => {
                let errors = self.validate_customer();
                if !errors.is_empty() {
                    self.field_errors = errors.clone();
                    return Err(AppError::FieldValidation(errors));
                }
                self.field_errors.clear();
                self.step = WizardStep::Review;
            }
            _ => return Err(self.illegal("advance")),
        }
        tracing::info!("Sesja {}: przejście do kroku {}", self.id, self.step);
        Ok(self.step)
    }

    pub fn retreat(&mut self) -> Result<WizardStep, AppError> {
        self.step = match self.step {
            WizardStep::ConfirmInfo => WizardStep::SelectDrinks,
            WizardStep::Review => WizardStep::ConfirmInfo,
            _ => return Err(self.illegal("retreat")),
        };
        tracing::info!("Sesja {}: powrót do kroku {}", self.id, self.step);
        Ok(self.step)
    }

    // --- KROK 2: podsumowanie i wysłanie ---

    /// Ponownie sprawdza wszystko przed wysłaniem i buduje payload zamówienia.
    /// Nie polega na tym, że wcześniejsze kroki już coś zwalidowały.
    pub fn build_order_request(
        &mut self,
        payment_method: PaymentMethod,
    ) -> Result<OrderRequest, AppError> {
        self.require_step(&[WizardStep::Review], "submit")?;

        if self.expansion.units().is_empty() {
            tracing::warn!("Sesja {}: koszyk jest pusty", self.id);
            return Err(AppError::UnprocessableEntity(
                "Koszyk jest pusty.".to_string(),
            ));
        }

        let errors = self.validate_customer();
        if !errors.is_empty() {
            self.field_errors = errors.clone();
            return Err(AppError::FieldValidation(errors));
        }

        if !self.all_assigned() {
            return Err(AppError::UnprocessableEntity(
                "Nie każda sztuka ma wybrany napój i kawiarnię.".to_string(),
            ));
        }

        self.payment_method = payment_method;

        let address = match self.customer.delivery_method {
            DeliveryMethod::Delivery => format_address(&self.customer),
            DeliveryMethod::Pickup => PICKUP_ADDRESS.to_string(),
        };

        Ok(OrderRequest {
            cart_id: self.expansion.cart().cart_id.clone(),
            address,
            phone: normalize_phone(&self.customer.phone),
            payment_method,
            delivery_method: self.customer.delivery_method,
            selections: selections_in_unit_order(self.expansion.units(), &self.selections),
        })
    }

    /// Zamówienie przyjęte: przejście do etapu dostawy.
    pub fn mark_submitted(&mut self, confirmation: OrderConfirmation) -> Result<(), AppError> {
        self.require_step(&[WizardStep::Review], "mark_submitted")?;
        tracing::info!(
            "Sesja {}: zamówienie złożone (ID: {:?})",
            self.id,
            confirmation.order_id
        );
        self.confirmation = Some(confirmation);
        self.step = WizardStep::DeliveryInProgress;
        self.delivery = DeliveryStatus::InProgress;
        Ok(())
    }

    // --- KROK 3: dostawa ---

    /// Oznacza ponowną próbę etapu dostawy.
    pub fn restart_delivery(&mut self) -> Result<(), AppError> {
        self.require_step(&[WizardStep::DeliveryInProgress], "retry_delivery")?;
        if !matches!(self.delivery, DeliveryStatus::Failed { .. }) {
            return Err(AppError::Conflict("Etap dostawy nadal trwa.".to_string()));
        }
        self.delivery = DeliveryStatus::InProgress;
        Ok(())
    }

    pub fn complete_delivery(&mut self, cart_cleared: bool) -> Result<(), AppError> {
        self.require_step(&[WizardStep::DeliveryInProgress], "complete_delivery")?;
        self.delivery = DeliveryStatus::Finished { cart_cleared };
        self.step = WizardStep::ThankYou;
        tracing::info!(
            "Sesja {}: zakończona (koszyk wyczyszczony: {})",
            self.id,
            cart_cleared
        );
        Ok(())
    }

    pub fn record_delivery_failure(&mut self, message: impl Into<String>) -> Result<(), AppError> {
        self.require_step(&[WizardStep::DeliveryInProgress], "record_delivery_failure")?;
        self.delivery = DeliveryStatus::Failed {
            message: message.into(),
        };
        Ok(())
    }

    pub fn view(&self) -> WizardView {
        WizardView {
            id: self.id,
            step: self.step,
            step_index: self.step.index(),
            cart_id: self.expansion.cart().cart_id.clone(),
            has_account: self.has_account,
            units: self.units(),
            active_unit: self.active_unit.clone(),
            all_assigned: self.all_assigned(),
            missing_units: unassigned_units(self.expansion.units(), &self.selections)
                .into_iter()
                .map(str::to_string)
                .collect(),
            customer: self.customer.clone(),
            field_errors: self.field_errors.clone(),
            payment_method: self.payment_method,
            total_price: self.expansion.cart().total_price(),
            confirmation: self.confirmation.clone(),
            delivery: self.delivery.clone(),
            created_at: self.created_at,
        }
    }
}

fn format_address(customer: &CustomerInfo) -> String {
    [&customer.street, &customer.city, &customer.country]
        .into_iter()
        .filter_map(|part| part.as_deref().map(str::trim))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
