// src/response.rs
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Json, Response};
use maud::Markup;
use serde::Serialize;
use serde_json::json;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// Krótkie powiadomienie dla użytkownika, wysyłane w nagłówku `HX-Trigger`.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Notification {
            kind,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, message)
    }

    /// Zwraca wartość nagłówka `HX-Trigger` w formacie oczekiwanym przez front.
    pub fn header_value(&self) -> Option<HeaderValue> {
        let trigger_payload = json!({
            "showMessage": {
                "message": self.message,
                "type": self.kind.to_string(),
            }
        });
        HeaderValue::from_str(&ascii_json(&trigger_payload.to_string())).ok()
    }

    pub fn into_headers(self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(trigger) = self.header_value() {
            headers.insert("HX-Trigger", trigger);
        }
        headers
    }
}

// Nagłówki HTTP muszą być w ASCII, więc polskie znaki idą jako \uXXXX.
fn ascii_json(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            let mut buf = [0u16; 2];
            for unit in c.encode_utf16(&mut buf) {
                escaped.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    escaped
}

/// Czy żądanie przyszło z HTMX (wtedy odsyłamy fragment HTML zamiast JSON-a).
pub fn is_htmx_request(headers: &HeaderMap) -> bool {
    headers.contains_key("HX-Request")
}

// Uniwersalny typ odpowiedzi: JSON dla API, fragment HTML dla HTMX
pub enum AppResponse<T: Serialize> {
    Json(T),
    Partial(Markup),
}

impl<T: Serialize> IntoResponse for AppResponse<T> {
    fn into_response(self) -> Response {
        match self {
            AppResponse::Json(body) => Json(body).into_response(),
            AppResponse::Partial(markup) => markup.into_response(),
        }
    }
}

/// Wybiera formę odpowiedzi na podstawie nagłówków żądania.
pub fn build_response<T: Serialize>(
    headers: &HeaderMap,
    body: T,
    render: impl FnOnce(&T) -> Markup,
) -> AppResponse<T> {
    if is_htmx_request(headers) {
        AppResponse::Partial(render(&body))
    } else {
        AppResponse::Json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_header_is_ascii_and_valid_json() {
        let notification = Notification::success("Zamówienie złożone!");
        let value = notification.header_value().unwrap();
        let text = value.to_str().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["showMessage"]["message"], "Zamówienie złożone!");
        assert_eq!(parsed["showMessage"]["type"], "success");
    }

    #[test]
    fn htmx_detection_uses_hx_request_header() {
        let mut headers = HeaderMap::new();
        assert!(!is_htmx_request(&headers));
        headers.insert("HX-Request", HeaderValue::from_static("true"));
        assert!(is_htmx_request(&headers));
    }
}
