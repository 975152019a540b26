// src/auth.rs

use std::convert::Infallible;

use axum::{
    RequestPartsExt,
    extract::FromRequestParts,
    http::{HeaderName, HeaderValue, header, request::Parts},
};
use axum_extra::TypedHeader;
use once_cell::sync::Lazy;
use uuid::Uuid;

pub use crate::auth_models::{AuthToken, Role};
use crate::errors::AppError;
use crate::state::AppState;
use crate::store::{KEY_TOKEN, KEY_USER, LocalStore, scoped_key};

pub static GUEST_CART_HEADER: Lazy<HeaderName> =
    Lazy::new(|| HeaderName::from_static("x-guest-cart-id"));
pub static CLIENT_SESSION_HEADER: Lazy<HeaderName> =
    Lazy::new(|| HeaderName::from_static("x-client-session"));

fn decode_uuid<'i, I>(values: &mut I) -> Result<Uuid, axum_extra::headers::Error>
where
    I: Iterator<Item = &'i HeaderValue>,
{
    let value = values
        .next()
        .ok_or_else(axum_extra::headers::Error::invalid)?;
    Uuid::parse_str(
        value
            .to_str()
            .map_err(|_| axum_extra::headers::Error::invalid())?,
    )
    .map_err(|_| axum_extra::headers::Error::invalid())
}

fn encode_uuid<E: Extend<HeaderValue>>(id: Uuid, values: &mut E) {
    // Uuid w postaci tekstowej to zawsze poprawny nagłówek
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        values.extend(std::iter::once(value));
    }
}

/// Identyfikator koszyka gościa przesyłany w nagłówku `X-Guest-Cart-Id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XGuestCartId(pub Uuid);

impl axum_extra::headers::Header for XGuestCartId {
    fn name() -> &'static HeaderName {
        &GUEST_CART_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, axum_extra::headers::Error>
    where
        Self: Sized,
        I: Iterator<Item = &'i HeaderValue>,
    {
        decode_uuid(values).map(XGuestCartId)
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        encode_uuid(self.0, values);
    }
}

/// Identyfikator klienta nadawany przy logowaniu (`X-Client-Session`).
/// Pod nim magazyn trzyma token tego klienta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XClientSession(pub Uuid);

impl axum_extra::headers::Header for XClientSession {
    fn name() -> &'static HeaderName {
        &CLIENT_SESSION_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, axum_extra::headers::Error>
    where
        Self: Sized,
        I: Iterator<Item = &'i HeaderValue>,
    {
        decode_uuid(values).map(XClientSession)
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        encode_uuid(self.0, values);
    }
}

/// Który koszyk obsługujemy: konto zalogowanego użytkownika czy koszyk gościa.
#[derive(Debug, Clone, PartialEq)]
pub enum CartContext {
    Account(AuthToken),
    Guest(Uuid),
}

impl CartContext {
    pub fn is_account(&self) -> bool {
        matches!(self, CartContext::Account(_))
    }
}

/// Tożsamość wywołującego: token z nagłówka `Authorization` albo token
/// zapisany dla jego `X-Client-Session`, oraz opcjonalny koszyk gościa.
/// Nigdy nie odrzuca żądania.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub token: Option<AuthToken>,
    pub client_session: Option<Uuid>,
    pub guest_cart_id: Option<Uuid>,
}

impl AuthContext {
    /// Kontekst koszyka. Konto ma pierwszeństwo przed gościem.
    pub fn cart_context(&self) -> Result<CartContext, AppError> {
        if let Some(token) = &self.token {
            Ok(CartContext::Account(token.clone()))
        } else if let Some(guest_id) = self.guest_cart_id {
            Ok(CartContext::Guest(guest_id))
        } else {
            tracing::warn!("Brak tożsamości użytkownika lub gościa. Brak koszyka.");
            Err(AppError::MissingToken(
                "Nie można zidentyfikować użytkownika ani koszyka gościa.".to_string(),
            ))
        }
    }

    /// Klucz zapamiętanych danych klienta dla tego wywołującego.
    pub fn profile_key(&self) -> Option<String> {
        match (self.client_session, self.guest_cart_id) {
            (Some(client), _) => Some(scoped_key(KEY_USER, client)),
            (None, Some(guest_id)) => Some(scoped_key(KEY_USER, format!("guest-{}", guest_id))),
            (None, None) => None,
        }
    }
}

/// Odczytuje token zapisany dla danego klienta.
pub async fn stored_token(store: &LocalStore, client: Uuid) -> Option<AuthToken> {
    store.get::<AuthToken>(&scoped_key(KEY_TOKEN, client)).await
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|raw| match raw.parse::<AuthToken>() {
                Ok(token) => Some(token),
                Err(e) => {
                    tracing::warn!("Ignoruję niepoprawny nagłówek Authorization: {}", e);
                    None
                }
            });

        let client_session = parts
            .extract::<TypedHeader<XClientSession>>()
            .await
            .ok()
            .map(|TypedHeader(XClientSession(id))| id);

        let token = match (header_token, client_session) {
            (Some(token), _) => Some(token),
            (None, Some(client)) => stored_token(&state.store, client).await,
            (None, None) => None,
        };

        let guest_cart_id = parts
            .extract::<TypedHeader<XGuestCartId>>()
            .await
            .ok()
            .map(|TypedHeader(XGuestCartId(id))| id);

        Ok(AuthContext {
            token,
            client_session,
            guest_cart_id,
        })
    }
}

/// Token administratora, wymagany przez panel admina.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    pub token: AuthToken,
    pub client_session: Option<Uuid>,
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Ok(context) = AuthContext::from_request_parts(parts, state).await;

        match context.token {
            Some(token) if token.is_admin() => Ok(AdminAuth {
                token,
                client_session: context.client_session,
            }),
            Some(_) => {
                tracing::warn!("Próba dostępu do panelu admina bez roli administratora");
                Err(AppError::UnauthorizedAccess(
                    "Ta operacja wymaga uprawnień administratora.".to_string(),
                ))
            }
            None => Err(AppError::MissingToken(
                "Brak lub niepoprawny nagłówek Authorization".into(),
            )),
        }
    }
}
