// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    User,
    Admin,
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DeliveryMethod {
    #[default]
    Delivery,
    Pickup,
}

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, EnumString, Display, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
}

// --- KATALOG ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Migawka produktu trzymana w pozycji koszyka.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub id: String,
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    #[validate(length(min = 1, max = 255, message = "Nazwa produktu jest wymagana"))]
    pub name: String,

    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,

    #[validate(range(min = 1, message = "Cena musi być dodatnia"))]
    pub price: i64,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub images: Vec<String>,
}

// --- KAWIARNIE I MENU ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Drink {
    pub id: String,
    pub name: String,
    pub price: i64,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cafe {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub menu: Vec<Drink>,
}

impl Cafe {
    pub fn find_drink(&self, drink_id: &str) -> Option<&Drink> {
        self.menu.iter().find(|drink| drink.id == drink_id)
    }
}

/// Kawiarnia zapisana przy przypisaniu, bez całego menu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CafeRef {
    pub id: String,
    pub name: String,
}

impl From<&Cafe> for CafeRef {
    fn from(cafe: &Cafe) -> Self {
        CafeRef {
            id: cafe.id.clone(),
            name: cafe.name.clone(),
        }
    }
}

// --- KOSZYK ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub product_id: String,
    pub product: ProductSnapshot,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub cart_id: String,
    #[serde(default)]
    pub items: Vec<CartLineItem>,
}

impl Cart {
    pub fn total_units(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn total_price(&self) -> i64 {
        self.items
            .iter()
            .map(|item| item.product.price * i64::from(item.quantity))
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartPayload {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

// --- DANE KLIENTA ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Częściowa aktualizacja formularza. Zmieniane są tylko przesłane pola.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfoPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub delivery_method: Option<DeliveryMethod>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

// --- ZAMÓWIENIE ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnitSelection {
    pub unit_id: String,
    pub product_id: String,
    pub drink_id: String,
    pub cafe_id: String,
}

/// Payload wysyłany do zewnętrznego endpointu checkout.
/// Budowany raz, przy finalnym potwierdzeniu, i potem już niezmieniany.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub cart_id: String,
    pub address: String,
    pub phone: String,
    pub payment_method: PaymentMethod,
    pub delivery_method: DeliveryMethod,
    pub selections: Vec<UnitSelection>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    #[serde(default, alias = "_id", alias = "id")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub order_id: Option<String>,
    pub message: Option<String>,
    pub placed_at: DateTime<Utc>,
}

impl From<CheckoutResponse> for OrderConfirmation {
    fn from(response: CheckoutResponse) -> Self {
        OrderConfirmation {
            order_id: response.order_id,
            message: response.message,
            placed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderPayload {
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDrinkPayload {
    pub cafe_id: String,
    pub drink_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn cart_totals_follow_quantities() {
        let cart = Cart {
            cart_id: "c1".to_string(),
            items: vec![
                CartLineItem {
                    product_id: "p1".to_string(),
                    product: ProductSnapshot {
                        id: "p1".to_string(),
                        name: "Bukiet róż".to_string(),
                        price: 15000,
                        image: None,
                    },
                    quantity: 2,
                },
                CartLineItem {
                    product_id: "p2".to_string(),
                    product: ProductSnapshot {
                        id: "p2".to_string(),
                        name: "Tulipany".to_string(),
                        price: 9000,
                        image: None,
                    },
                    quantity: 1,
                },
            ],
        };

        assert_eq!(cart.total_units(), 3);
        assert_eq!(cart.total_price(), 39000);
    }

    #[test]
    fn enums_parse_from_form_values() {
        assert_eq!(
            DeliveryMethod::from_str("Pickup").unwrap(),
            DeliveryMethod::Pickup
        );
        assert_eq!(PaymentMethod::from_str("card").unwrap(), PaymentMethod::Card);
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn order_request_uses_camel_case_on_the_wire() {
        let request = OrderRequest {
            cart_id: "cart-1".to_string(),
            address: "Tahrir 10, Kair, Egipt".to_string(),
            phone: "01012345678".to_string(),
            payment_method: PaymentMethod::Card,
            delivery_method: DeliveryMethod::Delivery,
            selections: vec![],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["cartId"], "cart-1");
        assert_eq!(json["paymentMethod"], "card");
        assert_eq!(json["deliveryMethod"], "delivery");
    }

    #[test]
    fn checkout_response_accepts_mongo_style_id() {
        let response: CheckoutResponse =
            serde_json::from_str(r#"{"_id": "abc123", "message": "ok"}"#).unwrap();
        assert_eq!(response.order_id.as_deref(), Some("abc123"));
    }
}
