// src/state.rs

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::api_client::StorefrontApi;
use crate::config::{AppConfig, ClearCartPolicy};
use crate::models::Cafe;
use crate::services::WizardSessions;
use crate::store::LocalStore;

/// Klucz jedynego wpisu w cache'u kawiarni.
pub const CAFES_CACHE_KEY: &str = "cafes";

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn StorefrontApi>,
    pub store: LocalStore,
    pub sessions: WizardSessions,
    pub cafe_cache: Cache<&'static str, Arc<Vec<Cafe>>>,
    pub clear_cart_policy: ClearCartPolicy,
    pub clear_cart_timeout: Duration,
}

impl AppState {
    pub fn new(api: Arc<dyn StorefrontApi>, store: LocalStore, config: &AppConfig) -> Self {
        Self::with_settings(
            api,
            store,
            config.wizard_idle,
            config.cafe_cache_ttl,
            config.clear_cart_policy,
            config.clear_cart_timeout,
        )
    }

    pub fn with_settings(
        api: Arc<dyn StorefrontApi>,
        store: LocalStore,
        wizard_idle: Duration,
        cafe_cache_ttl: Duration,
        clear_cart_policy: ClearCartPolicy,
        clear_cart_timeout: Duration,
    ) -> Self {
        let cafe_cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(cafe_cache_ttl)
            .build();

        AppState {
            api,
            store,
            sessions: WizardSessions::new(wizard_idle),
            cafe_cache,
            clear_cart_policy,
            clear_cart_timeout,
        }
    }
}
