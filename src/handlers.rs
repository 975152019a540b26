// src/handlers.rs

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use futures::future::try_join;
use maud::Markup;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{
    AdminAuth, AuthContext, AuthToken, CLIENT_SESSION_HEADER, CartContext, GUEST_CART_HEADER,
};
use crate::auth_models::LoginPayload;
use crate::cart_utils::resolve_assignment;
use crate::checkout::{ORDER_SUCCESS_MESSAGE, WizardHandle, run_delivery_stage, submit_order};
use crate::errors::AppError;
use crate::filters::ListingParams;
use crate::models::{
    AddToCartPayload, AssignDrinkPayload, Cafe, Cart, CustomerInfo, CustomerInfoPatch, Product,
    ProductPayload, SubmitOrderPayload,
};
use crate::pagination::PaginatedResponse;
use crate::response::{Notification, build_response};
use crate::services::{get_cafes, guard_session};
use crate::state::AppState;
use crate::store::{KEY_TOKEN, scoped_key};
use crate::views::render_wizard;
use crate::wizard::{OrderWizard, WizardStep, WizardView};

// --- KATALOG ---

pub async fn list_products(
    State(app_state): State<AppState>,
    Query(params): Query<ListingParams>,
) -> Result<Json<PaginatedResponse<Product>>, AppError> {
    tracing::info!("Lista produktów: {:?}", params);
    let page = app_state.api.list_products(&params).await?;
    Ok(Json(page))
}

pub async fn get_product_details(
    State(app_state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<Product>, AppError> {
    let product = app_state.api.get_product(&product_id).await?;
    Ok(Json(product))
}

pub async fn list_cafes_handler(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<Cafe>>, AppError> {
    let cafes = get_cafes(&app_state).await?;
    Ok(Json(cafes.as_ref().clone()))
}

// --- KOSZYK ---

pub async fn get_cart_handler(
    State(app_state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Cart>, AppError> {
    let ctx = auth.cart_context()?;
    let cart = guard_session(
        &app_state.store,
        auth.client_session,
        app_state.api.get_cart(&ctx).await,
    )
    .await?;
    Ok(Json(cart))
}

/// Dodaje produkt do koszyka. Gość bez koszyka dostaje nowy identyfikator w nagłówku.
pub async fn add_item_to_cart_handler(
    State(app_state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<AddToCartPayload>,
) -> Result<impl IntoResponse, AppError> {
    if payload.quantity == 0 {
        return Err(AppError::UnprocessableEntity(
            "Ilość musi być większa od zera.".to_string(),
        ));
    }

    let mut headers = Notification::success("Dodano do koszyka").into_headers();
    let ctx = match auth.cart_context() {
        Ok(ctx) => ctx,
        Err(_) => {
            let guest_id = Uuid::new_v4();
            tracing::info!("Nowy koszyk gościa: {}", guest_id);
            if let Ok(value) = HeaderValue::from_str(&guest_id.to_string()) {
                headers.insert(GUEST_CART_HEADER.clone(), value);
            }
            CartContext::Guest(guest_id)
        }
    };

    let cart = guard_session(
        &app_state.store,
        auth.client_session,
        app_state.api.add_to_cart(&ctx, &payload).await,
    )
    .await?;
    tracing::info!(
        "Produkt {} (x{}) dodany do koszyka {}",
        payload.product_id,
        payload.quantity,
        cart.cart_id
    );
    Ok((StatusCode::OK, headers, Json(cart)))
}

pub async fn remove_item_from_cart_handler(
    State(app_state): State<AppState>,
    auth: AuthContext,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = auth.cart_context()?;
    let cart = guard_session(
        &app_state.store,
        auth.client_session,
        app_state.api.remove_from_cart(&ctx, &product_id).await,
    )
    .await?;
    let headers = Notification::success("Usunięto z koszyka").into_headers();
    Ok((headers, Json(cart)))
}

pub async fn clear_cart_handler(
    State(app_state): State<AppState>,
    auth: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let ctx = auth.cart_context()?;
    guard_session(
        &app_state.store,
        auth.client_session,
        app_state.api.clear_cart(&ctx).await,
    )
    .await?;
    Ok((
        StatusCode::NO_CONTENT,
        Notification::success("Koszyk wyczyszczony").into_headers(),
    ))
}

// --- LOGOWANIE ---

/// Loguje klienta. Token trafia do magazynu pod identyfikatorem klienta
/// (`X-Client-Session`), który odsyłamy w nagłówku i w treści odpowiedzi.
pub async fn login_handler(
    State(app_state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        tracing::warn!("Błąd walidacji danych logowania: {:?}", validation_errors);
        return Err(AppError::ValidationError(validation_errors));
    }

    let response = app_state.api.login(&payload).await?;
    let token = AuthToken::new(response.role, response.token);
    let client = auth.client_session.unwrap_or_else(Uuid::new_v4);
    app_state
        .store
        .set(&scoped_key(KEY_TOKEN, client), &token)
        .await?;
    tracing::info!(
        "Zalogowano: {} (rola: {}, klient: {})",
        payload.email,
        token.role,
        client
    );

    let mut headers = Notification::success("Zalogowano pomyślnie").into_headers();
    if let Ok(value) = HeaderValue::from_str(&client.to_string()) {
        headers.insert(CLIENT_SESSION_HEADER.clone(), value);
    }
    Ok((
        headers,
        Json(json!({ "role": token.role, "clientSession": client })),
    ))
}

pub async fn logout_handler(
    State(app_state): State<AppState>,
    auth: AuthContext,
) -> Result<(StatusCode, HeaderMap), AppError> {
    match auth.client_session {
        Some(client) => {
            tracing::info!("Wylogowanie klienta {}: usuwanie tokenu z magazynu.", client);
            // Nasłuch magazynu sam zamknie sesje kreatora założone na koncie
            app_state
                .store
                .remove(&scoped_key(KEY_TOKEN, client))
                .await?;
        }
        None => tracing::debug!("Wylogowanie bez identyfikatora klienta, nic do usunięcia"),
    }
    Ok((
        StatusCode::OK,
        Notification::success("Wylogowano").into_headers(),
    ))
}

// --- PANEL ADMINA ---

pub async fn create_product_handler(
    State(app_state): State<AppState>,
    admin: AdminAuth,
    Json(payload): Json<ProductPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let product = guard_session(
        &app_state.store,
        admin.client_session,
        app_state.api.create_product(&admin.token, &payload).await,
    )
    .await?;
    tracing::info!("Utworzono produkt {}", product.id);
    Ok((
        StatusCode::CREATED,
        Notification::success("Produkt dodany").into_headers(),
        Json(product),
    ))
}

pub async fn update_product_handler(
    State(app_state): State<AppState>,
    admin: AdminAuth,
    Path(product_id): Path<String>,
    Json(payload): Json<ProductPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let product = guard_session(
        &app_state.store,
        admin.client_session,
        app_state
            .api
            .update_product(&admin.token, &product_id, &payload)
            .await,
    )
    .await?;
    Ok((
        Notification::success("Produkt zaktualizowany").into_headers(),
        Json(product),
    ))
}

pub async fn delete_product_handler(
    State(app_state): State<AppState>,
    admin: AdminAuth,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    guard_session(
        &app_state.store,
        admin.client_session,
        app_state.api.delete_product(&admin.token, &product_id).await,
    )
    .await?;
    tracing::info!("Usunięto produkt {}", product_id);
    Ok((
        StatusCode::NO_CONTENT,
        Notification::success("Produkt usunięty").into_headers(),
    ))
}

// --- KREATOR ZAMÓWIENIA ---

/// Zakłada sesję kreatora dla aktualnego koszyka.
pub async fn start_wizard_handler(
    State(app_state): State<AppState>,
    auth: AuthContext,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let ctx = auth.cart_context()?;
    // Menu kawiarni i tak będzie potrzebne w pierwszym kroku
    let (cart, cafes) = try_join(
        async {
            guard_session(
                &app_state.store,
                auth.client_session,
                app_state.api.get_cart(&ctx).await,
            )
            .await
        },
        get_cafes(&app_state),
    )
    .await?;
    tracing::debug!("Dostępnych kawiarni: {}", cafes.len());
    if cart.items.iter().all(|item| item.quantity == 0) {
        return Err(AppError::UnprocessableEntity(
            "Koszyk jest pusty.".to_string(),
        ));
    }

    let prefill = match auth.profile_key() {
        Some(key) => app_state.store.get::<CustomerInfo>(&key).await,
        None => None,
    };
    // Wylogowanie klienta zamyka tylko sesje oparte na jego zapisanym tokenie
    let owner = auth.client_session.filter(|_| ctx.is_account());
    let wizard = OrderWizard::new(Arc::new(cart), ctx, prefill);
    let view = wizard.view();
    app_state.sessions.insert(wizard, owner).await;

    Ok((
        StatusCode::CREATED,
        build_response(&headers, view, render_wizard),
    ))
}

pub async fn get_wizard_handler(
    State(app_state): State<AppState>,
    Path(wizard_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state.sessions.get(wizard_id).await?;
    let view = session.lock().await.view();
    Ok(build_response(&headers, view, render_wizard))
}

pub async fn cancel_wizard_handler(
    State(app_state): State<AppState>,
    Path(wizard_id): Path<Uuid>,
) -> Result<(StatusCode, HeaderMap), AppError> {
    if !app_state.sessions.remove(wizard_id).await {
        return Err(AppError::NotFound);
    }
    tracing::info!("Sesja kreatora {} anulowana", wizard_id);
    Ok((
        StatusCode::NO_CONTENT,
        Notification::success("Zamówienie anulowane").into_headers(),
    ))
}

pub async fn advance_wizard_handler(
    State(app_state): State<AppState>,
    auth: AuthContext,
    Path(wizard_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state.sessions.get(wizard_id).await?;
    let mut wizard = session.lock().await;
    let step = wizard.advance()?;

    if let (WizardStep::Review, Some(key)) = (step, auth.profile_key()) {
        // Zapamiętujemy dane klienta na następne zamówienia
        app_state.store.set(&key, wizard.customer()).await?;
    }

    let view = wizard.view();
    Ok(build_response(&headers, view, render_wizard))
}

pub async fn retreat_wizard_handler(
    State(app_state): State<AppState>,
    Path(wizard_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state.sessions.get(wizard_id).await?;
    let mut wizard = session.lock().await;
    wizard.retreat()?;
    Ok(build_response(&headers, wizard.view(), render_wizard))
}

pub async fn open_unit_handler(
    State(app_state): State<AppState>,
    Path((wizard_id, unit_id)): Path<(Uuid, String)>,
) -> Result<Json<WizardView>, AppError> {
    let session = app_state.sessions.get(wizard_id).await?;
    let mut wizard = session.lock().await;
    wizard.open_unit(&unit_id)?;
    Ok(Json(wizard.view()))
}

pub async fn assign_drink_handler(
    State(app_state): State<AppState>,
    Path((wizard_id, unit_id)): Path<(Uuid, String)>,
    headers: HeaderMap,
    Json(payload): Json<AssignDrinkPayload>,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state.sessions.get(wizard_id).await?;
    let cafes = get_cafes(&app_state).await?;
    let assignment = resolve_assignment(&cafes, &payload.cafe_id, &payload.drink_id)?;

    let mut wizard = session.lock().await;
    wizard.assign(&unit_id, assignment)?;
    Ok(build_response(&headers, wizard.view(), render_wizard))
}

pub async fn unassign_drink_handler(
    State(app_state): State<AppState>,
    Path((wizard_id, unit_id)): Path<(Uuid, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state.sessions.get(wizard_id).await?;
    let mut wizard = session.lock().await;
    wizard.unassign(&unit_id)?;
    Ok(build_response(&headers, wizard.view(), render_wizard))
}

pub async fn update_customer_handler(
    State(app_state): State<AppState>,
    Path(wizard_id): Path<Uuid>,
    Json(patch): Json<CustomerInfoPatch>,
) -> Result<Json<WizardView>, AppError> {
    let session = app_state.sessions.get(wizard_id).await?;
    let mut wizard = session.lock().await;
    wizard.update_customer(patch)?;
    Ok(Json(wizard.view()))
}

/// Wysyła zamówienie i uruchamia w tle etap dostawy.
pub async fn submit_order_handler(
    State(app_state): State<AppState>,
    auth: AuthContext,
    Path(wizard_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<SubmitOrderPayload>,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state.sessions.get(wizard_id).await?;

    let view = {
        // Blokada trzymana przez oba żądania do API: drugie wysłanie tej samej
        // sesji czeka i trafia już na krok DeliveryInProgress
        let mut wizard = session.lock().await;
        let result = submit_order(
            app_state.api.as_ref(),
            &mut wizard,
            payload.payment_method,
        )
        .await;
        guard_session(&app_state.store, auth.client_session, result).await?;
        wizard.view()
    };

    spawn_delivery_stage(&app_state, session, auth.client_session);

    Ok((
        Notification::success(ORDER_SUCCESS_MESSAGE).into_headers(),
        build_response(&headers, view, render_wizard),
    ))
}

/// Ręczne ponowienie czyszczenia koszyka po błędzie.
pub async fn retry_delivery_handler(
    State(app_state): State<AppState>,
    auth: AuthContext,
    Path(wizard_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state.sessions.get(wizard_id).await?;
    session.lock().await.restart_delivery()?;

    let result = run_delivery_stage(
        app_state.api.clone(),
        session.clone(),
        app_state.clear_cart_policy,
        app_state.clear_cart_timeout,
    )
    .await;
    guard_session(&app_state.store, auth.client_session, result).await?;

    let view = session.lock().await.view();
    Ok(build_response(&headers, view, render_wizard))
}

pub async fn wizard_fragment_handler(
    State(app_state): State<AppState>,
    Path(wizard_id): Path<Uuid>,
) -> Result<Markup, AppError> {
    let session = app_state.sessions.get(wizard_id).await?;
    let view = session.lock().await.view();
    Ok(render_wizard(&view))
}

fn spawn_delivery_stage(app_state: &AppState, session: WizardHandle, client: Option<Uuid>) {
    let api = app_state.api.clone();
    let store = app_state.store.clone();
    let policy = app_state.clear_cart_policy;
    let timeout = app_state.clear_cart_timeout;
    tokio::spawn(async move {
        let result = run_delivery_stage(api, session, policy, timeout).await;
        if let Err(e) = guard_session(&store, client, result).await {
            tracing::debug!("Etap dostawy czeka na ponowienie: {}", e);
        }
    });
}
