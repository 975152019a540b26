// src/validation.rs

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{CustomerInfo, CustomerInfoPatch, DeliveryMethod};

/// Mapa: nazwa pola -> komunikat błędu. Pusta mapa oznacza poprawny formularz.
pub type FieldErrors = BTreeMap<&'static str, String>;

pub const FIELD_NAME: &str = "name";
pub const FIELD_EMAIL: &str = "email";
pub const FIELD_PHONE: &str = "phone";
pub const FIELD_STREET: &str = "street";
pub const FIELD_CITY: &str = "city";
pub const FIELD_COUNTRY: &str = "country";

const NAME_MIN_LEN: usize = 3;
const STREET_MIN_LEN: usize = 5;
const CITY_MIN_LEN: usize = 2;
const COUNTRY_MIN_LEN: usize = 2;

pub const PHONE_DIGITS: usize = 11;
/// Prefiksy operatorów komórkowych (010, 011, 012, 015).
pub const PHONE_PREFIXES: [&str; 4] = ["010", "011", "012", "015"];

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Niepoprawny regex e-mail"));

/// Zostawia w numerze wyłącznie cyfry.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

pub fn is_valid_phone(raw: &str) -> bool {
    let digits = normalize_phone(raw);
    digits.len() == PHONE_DIGITS && PHONE_PREFIXES.iter().any(|p| digits.starts_with(p))
}

pub fn is_valid_email(raw: &str) -> bool {
    EMAIL_RE.is_match(raw.trim())
}

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

fn optional_text(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or("")
}

/// Waliduje dane osobowe i adres dostawy.
///
/// Przy istniejącym koncie puste imię, e-mail i telefon są dopuszczalne,
/// ale jeśli ktoś je poda, muszą mieć poprawny format. Pola adresu są
/// wymagane tylko przy dostawie; przy odbiorze osobistym ich wartości
/// zostają, ale nie blokują wysłania formularza.
pub fn validate_customer_info(info: &CustomerInfo, has_account: bool) -> FieldErrors {
    let mut errors = FieldErrors::new();

    let name = info.name.trim();
    if name.is_empty() {
        if !has_account {
            errors.insert(FIELD_NAME, "Imię i nazwisko jest wymagane".to_string());
        }
    } else if char_len(name) < NAME_MIN_LEN {
        errors.insert(
            FIELD_NAME,
            format!("Imię musi mieć co najmniej {} znaki", NAME_MIN_LEN),
        );
    }

    let email = info.email.trim();
    if email.is_empty() {
        if !has_account {
            errors.insert(FIELD_EMAIL, "Adres e-mail jest wymagany".to_string());
        }
    } else if !is_valid_email(email) {
        errors.insert(FIELD_EMAIL, "Niepoprawny format adresu e-mail".to_string());
    }

    let phone = info.phone.trim();
    if phone.is_empty() {
        if !has_account {
            errors.insert(FIELD_PHONE, "Numer telefonu jest wymagany".to_string());
        }
    } else if !is_valid_phone(phone) {
        errors.insert(
            FIELD_PHONE,
            format!(
                "Numer telefonu musi mieć {} cyfr i zaczynać się od {}",
                PHONE_DIGITS,
                PHONE_PREFIXES.join(", ")
            ),
        );
    }

    if info.delivery_method == DeliveryMethod::Delivery {
        let street = optional_text(&info.street);
        if char_len(street) < STREET_MIN_LEN {
            errors.insert(
                FIELD_STREET,
                format!("Ulica musi mieć co najmniej {} znaków", STREET_MIN_LEN),
            );
        }
        let city = optional_text(&info.city);
        if char_len(city) < CITY_MIN_LEN {
            errors.insert(
                FIELD_CITY,
                format!("Miasto musi mieć co najmniej {} znaki", CITY_MIN_LEN),
            );
        }
        let country = optional_text(&info.country);
        if char_len(country) < COUNTRY_MIN_LEN {
            errors.insert(
                FIELD_COUNTRY,
                format!("Kraj musi mieć co najmniej {} znaki", COUNTRY_MIN_LEN),
            );
        }
    }

    errors
}

/// Nakłada częściową zmianę na dane klienta i zwraca nazwy zmienionych pól.
pub fn apply_patch(info: &mut CustomerInfo, patch: CustomerInfoPatch) -> Vec<&'static str> {
    let mut touched = Vec::new();

    if let Some(name) = patch.name {
        info.name = name;
        touched.push(FIELD_NAME);
    }
    if let Some(email) = patch.email {
        info.email = email;
        touched.push(FIELD_EMAIL);
    }
    if let Some(phone) = patch.phone {
        info.phone = phone;
        touched.push(FIELD_PHONE);
    }
    if let Some(method) = patch.delivery_method {
        info.delivery_method = method;
        // Zmiana metody dostawy zmienia wymagania dla całego adresu
        touched.extend([FIELD_STREET, FIELD_CITY, FIELD_COUNTRY]);
    }
    if let Some(street) = patch.street {
        info.street = Some(street);
        touched.push(FIELD_STREET);
    }
    if let Some(city) = patch.city {
        info.city = Some(city);
        touched.push(FIELD_CITY);
    }
    if let Some(country) = patch.country {
        info.country = Some(country);
        touched.push(FIELD_COUNTRY);
    }

    touched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_info() -> CustomerInfo {
        CustomerInfo {
            name: "Amira Hassan".to_string(),
            email: "amira@example.com".to_string(),
            phone: "010 1234 5678".to_string(),
            delivery_method: DeliveryMethod::Delivery,
            street: Some("Tahrir Square 10".to_string()),
            city: Some("Kair".to_string()),
            country: Some("Egipt".to_string()),
        }
    }

    #[test]
    fn phone_rules() {
        assert!(is_valid_phone("01012345678"));
        assert!(is_valid_phone("+0 10-1234-5678"));
        assert!(!is_valid_phone("0101234567"));
        assert!(!is_valid_phone("02012345678"));
        assert!(!is_valid_phone("010123456789"));
        for prefix in PHONE_PREFIXES {
            assert!(is_valid_phone(&format!("{}12345678", prefix)));
        }
    }

    #[test]
    fn email_rules() {
        assert!(is_valid_email("a@b.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a"));
        assert!(!is_valid_email("a b@c.com"));
    }

    #[test]
    fn complete_form_has_no_errors() {
        assert!(validate_customer_info(&complete_info(), false).is_empty());
    }

    #[test]
    fn missing_phone_is_reported() {
        let mut info = complete_info();
        info.phone.clear();
        let errors = validate_customer_info(&info, false);
        assert!(errors.contains_key(FIELD_PHONE));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn account_holders_may_leave_contact_fields_empty() {
        let mut info = complete_info();
        info.name.clear();
        info.email.clear();
        info.phone.clear();
        assert!(validate_customer_info(&info, true).is_empty());

        info.email = "zly-adres".to_string();
        let errors = validate_customer_info(&info, true);
        assert!(errors.contains_key(FIELD_EMAIL));
    }

    #[test]
    fn short_values_are_rejected() {
        let mut info = complete_info();
        info.name = "Al".to_string();
        info.street = Some("Ul".to_string());
        info.city = Some("K".to_string());
        info.country = None;
        let errors = validate_customer_info(&info, false);
        let keys: Vec<_> = errors.keys().copied().collect();
        assert_eq!(
            keys,
            vec![FIELD_CITY, FIELD_COUNTRY, FIELD_NAME, FIELD_STREET]
        );
    }

    #[test]
    fn switching_to_pickup_drops_address_requirements_but_keeps_values() {
        let mut info = complete_info();
        info.street = Some("Ul".to_string());
        info.city = None;
        assert!(validate_customer_info(&info, false).contains_key(FIELD_STREET));

        let touched = apply_patch(
            &mut info,
            CustomerInfoPatch {
                delivery_method: Some(DeliveryMethod::Pickup),
                ..Default::default()
            },
        );

        assert!(touched.contains(&FIELD_STREET));
        assert_eq!(info.street.as_deref(), Some("Ul"));
        assert!(validate_customer_info(&info, false).is_empty());
    }
}
