// src/test_support.rs
// Dane testowe i atrapa API sklepu współdzielone przez testy modułów.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::api_client::StorefrontApi;
use crate::auth::{AuthToken, CartContext};
use crate::auth_models::{LoginPayload, LoginResponse};
use crate::errors::AppError;
use crate::filters::ListingParams;
use crate::models::{
    AddToCartPayload, Cafe, Cart, CartLineItem, CheckoutResponse, CustomerInfo,
    CustomerInfoPatch, DeliveryMethod, Drink, OrderRequest, Product, ProductPayload,
    ProductSnapshot, Role,
};
use crate::pagination::PaginatedResponse;

pub fn sample_cart(quantities: &[(&str, u32)]) -> Cart {
    Cart {
        cart_id: "cart-1".to_string(),
        items: quantities
            .iter()
            .map(|(product_id, quantity)| CartLineItem {
                product_id: product_id.to_string(),
                product: ProductSnapshot {
                    id: product_id.to_string(),
                    name: format!("Bukiet {}", product_id),
                    price: 12000,
                    image: None,
                },
                quantity: *quantity,
            })
            .collect(),
    }
}

pub fn sample_cafes() -> Vec<Cafe> {
    vec![
        Cafe {
            id: "cafe-1".to_string(),
            name: "Kawiarnia Zamalek".to_string(),
            address: Some("26 July St, Kair".to_string()),
            menu: vec![
                Drink {
                    id: "latte".to_string(),
                    name: "Latte".to_string(),
                    price: 4500,
                    image: None,
                },
                Drink {
                    id: "espresso".to_string(),
                    name: "Espresso".to_string(),
                    price: 3000,
                    image: None,
                },
            ],
        },
        Cafe {
            id: "cafe-2".to_string(),
            name: "Kawiarnia Maadi".to_string(),
            address: None,
            menu: vec![Drink {
                id: "mint-tea".to_string(),
                name: "Herbata miętowa".to_string(),
                price: 2500,
                image: None,
            }],
        },
    ]
}

pub fn guest_context() -> CartContext {
    CartContext::Guest(Uuid::nil())
}

pub fn valid_customer() -> CustomerInfo {
    CustomerInfo {
        name: "Amira Hassan".to_string(),
        email: "amira@example.com".to_string(),
        phone: "01012345678".to_string(),
        delivery_method: DeliveryMethod::Delivery,
        street: Some("Tahrir Square 10".to_string()),
        city: Some("Kair".to_string()),
        country: Some("Egipt".to_string()),
    }
}

pub fn valid_customer_patch() -> CustomerInfoPatch {
    let info = valid_customer();
    CustomerInfoPatch {
        name: Some(info.name),
        email: Some(info.email),
        phone: Some(info.phone),
        delivery_method: Some(info.delivery_method),
        street: info.street,
        city: info.city,
        country: info.country,
    }
}

/// Atrapa API sklepu liczącą wywołania.
pub struct FakeApi {
    pub cart: Mutex<Cart>,
    pub cafes: Vec<Cafe>,
    pub checkout_calls: AtomicUsize,
    pub clear_calls: AtomicUsize,
    pub cafe_calls: AtomicUsize,
    pub fail_checkout: AtomicBool,
    pub fail_clear: AtomicBool,
    pub reject_token: AtomicBool,
    pub clear_delay: Option<Duration>,
    pub last_order: Mutex<Option<OrderRequest>>,
}

impl FakeApi {
    pub fn new(cart: Cart) -> Self {
        FakeApi {
            cart: Mutex::new(cart),
            cafes: sample_cafes(),
            checkout_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
            cafe_calls: AtomicUsize::new(0),
            fail_checkout: AtomicBool::new(false),
            fail_clear: AtomicBool::new(false),
            reject_token: AtomicBool::new(false),
            clear_delay: None,
            last_order: Mutex::new(None),
        }
    }

    pub fn with_clear_delay(mut self, delay: Duration) -> Self {
        self.clear_delay = Some(delay);
        self
    }

    pub fn checkout_count(&self) -> usize {
        self.checkout_calls.load(Ordering::SeqCst)
    }

    pub fn clear_count(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    fn current_cart(&self) -> Cart {
        self.cart.lock().unwrap().clone()
    }

    fn check_token(&self, ctx: &CartContext) -> Result<(), AppError> {
        if ctx.is_account() && self.reject_token.load(Ordering::SeqCst) {
            return Err(AppError::SessionExpired);
        }
        Ok(())
    }

    fn sample_product(id: &str, payload: &ProductPayload) -> Product {
        Product {
            id: id.to_string(),
            name: payload.name.clone(),
            description: payload.description.clone(),
            price: payload.price,
            category: payload.category.clone(),
            images: payload.images.clone(),
        }
    }
}

#[async_trait]
impl StorefrontApi for FakeApi {
    async fn list_products(
        &self,
        params: &ListingParams,
    ) -> Result<PaginatedResponse<Product>, AppError> {
        let data: Vec<Product> = self
            .current_cart()
            .items
            .iter()
            .map(|item| Product {
                id: item.product_id.clone(),
                name: item.product.name.clone(),
                description: String::new(),
                price: item.product.price,
                category: None,
                images: vec![],
            })
            .collect();
        Ok(PaginatedResponse {
            total_items: data.len() as i64,
            total_pages: 1,
            current_page: 1,
            per_page: params.limit(),
            data,
        })
    }

    async fn get_product(&self, product_id: &str) -> Result<Product, AppError> {
        let page = self.list_products(&ListingParams::default()).await?;
        page.data
            .into_iter()
            .find(|p| p.id == product_id)
            .ok_or(AppError::NotFound)
    }

    async fn list_cafes(&self) -> Result<Vec<Cafe>, AppError> {
        self.cafe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.cafes.clone())
    }

    async fn get_cart(&self, ctx: &CartContext) -> Result<Cart, AppError> {
        self.check_token(ctx)?;
        Ok(self.current_cart())
    }

    async fn add_to_cart(
        &self,
        ctx: &CartContext,
        payload: &AddToCartPayload,
    ) -> Result<Cart, AppError> {
        self.check_token(ctx)?;
        let mut cart = self.cart.lock().unwrap();
        match cart
            .items
            .iter_mut()
            .find(|item| item.product_id == payload.product_id)
        {
            Some(item) => item.quantity += payload.quantity,
            None => cart.items.push(CartLineItem {
                product_id: payload.product_id.clone(),
                product: ProductSnapshot {
                    id: payload.product_id.clone(),
                    name: format!("Bukiet {}", payload.product_id),
                    price: 12000,
                    image: None,
                },
                quantity: payload.quantity,
            }),
        }
        Ok(cart.clone())
    }

    async fn remove_from_cart(
        &self,
        ctx: &CartContext,
        product_id: &str,
    ) -> Result<Cart, AppError> {
        self.check_token(ctx)?;
        let mut cart = self.cart.lock().unwrap();
        cart.items.retain(|item| item.product_id != product_id);
        Ok(cart.clone())
    }

    async fn clear_cart(&self, ctx: &CartContext) -> Result<(), AppError> {
        self.check_token(ctx)?;
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.clear_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(AppError::UpstreamStatus {
                status: 500,
                message: "Nie udało się wyczyścić koszyka".to_string(),
            });
        }
        self.cart.lock().unwrap().items.clear();
        Ok(())
    }

    async fn checkout(
        &self,
        ctx: &CartContext,
        order: &OrderRequest,
    ) -> Result<CheckoutResponse, AppError> {
        self.check_token(ctx)?;
        self.checkout_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_checkout.load(Ordering::SeqCst) {
            return Err(AppError::UpstreamStatus {
                status: 500,
                message: "Płatność odrzucona".to_string(),
            });
        }
        *self.last_order.lock().unwrap() = Some(order.clone());
        Ok(CheckoutResponse {
            order_id: Some("order-1".to_string()),
            message: Some("Zamówienie przyjęte".to_string()),
        })
    }

    async fn login(&self, payload: &LoginPayload) -> Result<LoginResponse, AppError> {
        if payload.password == "haslo123" {
            let role = if payload.email.starts_with("admin") {
                Role::Admin
            } else {
                Role::User
            };
            Ok(LoginResponse {
                token: "token-1".to_string(),
                role,
            })
        } else {
            Err(AppError::UnprocessableEntity(
                "Nieprawidłowe dane logowania".to_string(),
            ))
        }
    }

    async fn create_product(
        &self,
        _auth: &AuthToken,
        payload: &ProductPayload,
    ) -> Result<Product, AppError> {
        Ok(Self::sample_product("new-product", payload))
    }

    async fn update_product(
        &self,
        _auth: &AuthToken,
        product_id: &str,
        payload: &ProductPayload,
    ) -> Result<Product, AppError> {
        Ok(Self::sample_product(product_id, payload))
    }

    async fn delete_product(&self, _auth: &AuthToken, _product_id: &str) -> Result<(), AppError> {
        Ok(())
    }
}
