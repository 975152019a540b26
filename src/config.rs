// src/config.rs

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use strum_macros::{Display, EnumString};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Brak zmiennej środowiskowej: {0}")]
    MissingEnvVar(String),
    #[error("Niepoprawna wartość zmiennej {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Co robić, gdy czyszczenie koszyka po złożeniu zamówienia się nie powiedzie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum ClearCartPolicy {
    /// Zaloguj błąd i przejdź dalej.
    #[default]
    BestEffort,
    /// Pokaż błąd i zatrzymaj kreator do ręcznego ponowienia.
    Required,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub storefront_api_url: Url,
    pub http_timeout: Duration,
    pub clear_cart_policy: ClearCartPolicy,
    pub clear_cart_timeout: Duration,
    pub local_store_path: PathBuf,
    pub wizard_idle: Duration,
    pub cafe_cache_ttl: Duration,
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CLEAR_CART_TIMEOUT_SECS: u64 = 5;
const DEFAULT_LOCAL_STORE_PATH: &str = "data/local_store.json";
const DEFAULT_WIZARD_IDLE_MINUTES: u64 = 30;
const DEFAULT_CAFE_CACHE_TTL_SECS: u64 = 300;

impl AppConfig {
    /// Wczytuje konfigurację ze zmiennych środowiskowych.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Wersja z wstrzykiwanym źródłem zmiennych (przydaje się w testach).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url_raw = lookup("STOREFRONT_API_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("STOREFRONT_API_URL".to_string()))?;
        let storefront_api_url = Url::parse(api_url_raw.trim()).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_API_URL".to_string(), e.to_string())
        })?;

        let bind_addr: SocketAddr = parse_or(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR.parse().ok())?;
        let http_timeout_secs = parse_or(
            &lookup,
            "HTTP_TIMEOUT_SECS",
            Some(DEFAULT_HTTP_TIMEOUT_SECS),
        )?;
        let clear_cart_policy = parse_or(
            &lookup,
            "CART_CLEAR_POLICY",
            Some(ClearCartPolicy::default()),
        )?;
        let clear_cart_timeout_secs = parse_or(
            &lookup,
            "CART_CLEAR_TIMEOUT_SECS",
            Some(DEFAULT_CLEAR_CART_TIMEOUT_SECS),
        )?;
        let wizard_idle_minutes = parse_or(
            &lookup,
            "WIZARD_IDLE_MINUTES",
            Some(DEFAULT_WIZARD_IDLE_MINUTES),
        )?;
        let cafe_cache_ttl_secs = parse_or(
            &lookup,
            "CAFE_CACHE_TTL_SECS",
            Some(DEFAULT_CAFE_CACHE_TTL_SECS),
        )?;
        let local_store_path = lookup("LOCAL_STORE_PATH")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOCAL_STORE_PATH.to_string());

        Ok(AppConfig {
            bind_addr,
            storefront_api_url,
            http_timeout: Duration::from_secs(http_timeout_secs),
            clear_cart_policy,
            clear_cart_timeout: Duration::from_secs(clear_cart_timeout_secs),
            local_store_path: PathBuf::from(local_store_path),
            wizard_idle: Duration::from_secs(wizard_idle_minutes * 60),
            cafe_cache_ttl: Duration::from_secs(cafe_cache_ttl_secs),
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Option<T>,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingEnvVar(key.to_string())),
    }
}
