// src/main.rs

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Deklaracje modułów
mod api_client; // klient REST API sklepu
mod auth; // ekstraktory tożsamości
mod auth_models;
mod cart_utils; // rozwijanie koszyka na sztuki
mod checkout;
mod config;
mod errors;
mod filters;
mod handlers;
mod models;
mod pagination;
mod response;
mod services;
mod state;
mod store;
mod validation;
mod views;
mod wizard;

#[cfg(test)]
mod test_support;

// Importy z własnych modułów
use crate::api_client::HttpStorefrontApi;
use crate::config::AppConfig;
use crate::handlers::*;
use crate::state::AppState;
use crate::store::LocalStore;

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Inicjalizacja systemu logowania (tracing)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cafe_checkout_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Inicjalizacja serwera...");

    // --- Konfiguracja ---
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Niepoprawna konfiguracja: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "API sklepu: {}, polityka czyszczenia koszyka: {}",
        config.storefront_api_url,
        config.clear_cart_policy
    );

    // --- Magazyn lokalny ---
    let store = match LocalStore::open(&config.local_store_path).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(
                "Nie można otworzyć magazynu {}: {}",
                config.local_store_path.display(),
                e
            );
            std::process::exit(1);
        }
    };

    // --- Klient API sklepu ---
    let api = match HttpStorefrontApi::new(&config.storefront_api_url, config.http_timeout) {
        Ok(api) => api,
        Err(e) => {
            tracing::error!("Nie można utworzyć klienta HTTP: {}", e);
            std::process::exit(1);
        }
    };

    let app_state = AppState::new(Arc::new(api), store, &config);
    services::spawn_store_listener(&app_state.store, app_state.sessions.clone());

    let app = build_router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.bind_addr;
    tracing::info!("Serwer nasłuchuje na {}", addr);

    // Utworzenie listenera TCP
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Nie można powiązać adresu {}: {}", addr, e);
            return;
        }
    };

    // Uruchomienie serwera Axum
    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        tracing::error!("Błąd serwera: {}", e);
    }
}

// Definicja routingu aplikacji
fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/{id}", get(get_product_details))
        .route("/api/cafes", get(list_cafes_handler))
        .route("/api/cart", get(get_cart_handler).delete(clear_cart_handler))
        .route("/api/cart/items", post(add_item_to_cart_handler))
        .route(
            "/api/cart/items/{product_id}",
            delete(remove_item_from_cart_handler),
        )
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/admin/products", post(create_product_handler))
        .route(
            "/api/admin/products/{id}",
            patch(update_product_handler).delete(delete_product_handler),
        )
        .route("/api/wizard", post(start_wizard_handler))
        .route(
            "/api/wizard/{id}",
            get(get_wizard_handler).delete(cancel_wizard_handler),
        )
        .route("/api/wizard/{id}/advance", post(advance_wizard_handler))
        .route("/api/wizard/{id}/retreat", post(retreat_wizard_handler))
        .route(
            "/api/wizard/{id}/units/{unit_id}/open",
            post(open_unit_handler),
        )
        .route(
            "/api/wizard/{id}/units/{unit_id}",
            put(assign_drink_handler).delete(unassign_drink_handler),
        )
        .route("/api/wizard/{id}/customer", patch(update_customer_handler))
        .route("/api/wizard/{id}/submit", post(submit_order_handler))
        .route(
            "/api/wizard/{id}/delivery/retry",
            post(retry_delivery_handler),
        )
        .route("/api/wizard/{id}/review", get(wizard_fragment_handler))
        .with_state(app_state)
}
