// src/errors.rs
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

use crate::response::{Notification, NotificationKind};
use crate::validation::FieldErrors;
use crate::wizard::WizardStep;

pub const LOGIN_PAGE: &str = "/login";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Błąd połączenia z API sklepu: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("API sklepu zwróciło status {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("Nie znaleziono zasobu")]
    NotFound,

    #[error("Błędy walidacji")]
    ValidationError(#[from] ValidationErrors),

    #[error("Formularz zawiera błędy")]
    FieldValidation(FieldErrors),

    #[error("Nieprawidłowe dane wejściowe: {0}")]
    UnprocessableEntity(String),

    #[error("Brak wymaganego tokenu: {0}")]
    MissingToken(String),

    #[error("Sesja wygasła")]
    SessionExpired,

    #[error("Nieautoryzowany dostęp: {0}")]
    UnauthorizedAccess(String),

    #[error("Niedozwolone przejście '{action}' z kroku {from}")]
    IllegalTransition {
        from: WizardStep,
        action: &'static str,
    },

    #[error("Wystąpił konflikt: {0}")]
    Conflict(String),

    #[error("Przekroczono czas oczekiwania: {0}")]
    Timeout(String),

    #[error("Błąd lokalnego magazynu: {0}")]
    StoreError(#[from] std::io::Error),

    #[error("Błąd serializacji: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Wewnętrzny błąd serwera")]
    InternalServerError(String),
}

impl AppError {
    /// Status HTTP odpowiadający wariantowi błędu.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Upstream(err) if err.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamStatus { status, .. } => match *status {
                400 => StatusCode::BAD_REQUEST,
                404 => StatusCode::NOT_FOUND,
                409 => StatusCode::CONFLICT,
                422 => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::BAD_GATEWAY,
            },
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::ValidationError(_)
            | AppError::FieldValidation(_)
            | AppError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::MissingToken(_) | AppError::SessionExpired => StatusCode::UNAUTHORIZED,
            AppError::UnauthorizedAccess(_) => StatusCode::FORBIDDEN,
            AppError::IllegalTransition { .. } | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::StoreError(_)
            | AppError::Serialization(_)
            | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Komunikat, który zobaczy użytkownik w powiadomieniu.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Upstream(err) => {
                tracing::error!("Błąd połączenia z API sklepu: {:?}", err);
                if err.is_timeout() {
                    "Serwer sklepu nie odpowiada. Spróbuj ponownie.".to_string()
                } else {
                    "Nie udało się połączyć z serwerem sklepu.".to_string()
                }
            }
            AppError::UpstreamStatus { message, .. } => message.clone(),
            AppError::NotFound => "Nie znaleziono zasobu".to_string(),
            AppError::ValidationError(errors) => {
                let mut messages = Vec::new();
                for (field, field_errors) in errors.field_errors() {
                    for error in field_errors {
                        let msg = error.message.as_ref().map_or_else(
                            || format!("Pole '{}' jest nieprawidłowe", field),
                            |m| format!("Pole '{}': {}", field, m),
                        );
                        messages.push(msg);
                    }
                }
                messages.join("; ")
            }
            AppError::FieldValidation(_) => "Popraw błędy w formularzu.".to_string(),
            AppError::UnprocessableEntity(message)
            | AppError::MissingToken(message)
            | AppError::UnauthorizedAccess(message)
            | AppError::Conflict(message)
            | AppError::Timeout(message) => message.clone(),
            AppError::SessionExpired => "Sesja wygasła. Zaloguj się ponownie.".to_string(),
            AppError::IllegalTransition { .. } => self.to_string(),
            AppError::StoreError(err) => {
                tracing::error!("Błąd lokalnego magazynu: {:?}", err);
                "Nie udało się zapisać danych lokalnych.".to_string()
            }
            AppError::Serialization(err) => {
                tracing::error!("Błąd serializacji: {:?}", err);
                "Wystąpił wewnętrzny błąd serwera".to_string()
            }
            AppError::InternalServerError(message) => {
                tracing::error!("Wewnętrzny błąd serwera: {}", message);
                "Wystąpił wewnętrzny błąd serwera".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = self.user_message();

        let body = match &self {
            AppError::FieldValidation(errors) => {
                Json(json!({ "error": error_message, "errors": errors }))
            }
            _ => Json(json!({ "error": error_message })),
        };

        let mut response = (status, body).into_response();
        let headers = response.headers_mut();

        let notification = Notification::new(NotificationKind::Error, error_message);
        if let Some(trigger) = notification.header_value() {
            headers.insert("HX-Trigger", trigger);
        }

        if matches!(self, AppError::SessionExpired) {
            // Sesja jest martwa, front ma przejść na stronę logowania
            headers.insert("HX-Redirect", HeaderValue::from_static(LOGIN_PAGE));
            headers.insert(header::LOCATION, HeaderValue::from_static(LOGIN_PAGE));
        }

        response
    }
}
