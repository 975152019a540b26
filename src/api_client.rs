// src/api_client.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use urlencoding::encode;

use crate::auth::{AuthToken, CartContext, GUEST_CART_HEADER};
use crate::auth_models::{LoginPayload, LoginResponse};
use crate::errors::AppError;
use crate::filters::ListingParams;
use crate::models::{
    AddToCartPayload, Cafe, Cart, CheckoutResponse, OrderRequest, Product, ProductPayload,
};
use crate::pagination::PaginatedResponse;

/// Komunikat, gdy API nie zwróciło nic sensownego w treści błędu.
pub const GENERIC_FAILURE: &str = "Wystąpił błąd. Spróbuj ponownie.";

/// Zewnętrzne REST API sklepu (katalog, kawiarnie, koszyk, zamówienia, logowanie).
#[async_trait]
pub trait StorefrontApi: Send + Sync {
    async fn list_products(
        &self,
        params: &ListingParams,
    ) -> Result<PaginatedResponse<Product>, AppError>;

    async fn get_product(&self, product_id: &str) -> Result<Product, AppError>;

    async fn list_cafes(&self) -> Result<Vec<Cafe>, AppError>;

    async fn get_cart(&self, ctx: &CartContext) -> Result<Cart, AppError>;

    async fn add_to_cart(
        &self,
        ctx: &CartContext,
        payload: &AddToCartPayload,
    ) -> Result<Cart, AppError>;

    async fn remove_from_cart(&self, ctx: &CartContext, product_id: &str)
    -> Result<Cart, AppError>;

    async fn clear_cart(&self, ctx: &CartContext) -> Result<(), AppError>;

    async fn checkout(
        &self,
        ctx: &CartContext,
        order: &OrderRequest,
    ) -> Result<CheckoutResponse, AppError>;

    async fn login(&self, payload: &LoginPayload) -> Result<LoginResponse, AppError>;

    async fn create_product(
        &self,
        auth: &AuthToken,
        payload: &ProductPayload,
    ) -> Result<Product, AppError>;

    async fn update_product(
        &self,
        auth: &AuthToken,
        product_id: &str,
        payload: &ProductPayload,
    ) -> Result<Product, AppError>;

    async fn delete_product(&self, auth: &AuthToken, product_id: &str) -> Result<(), AppError>;
}

/// Implementacja [`StorefrontApi`] na reqwest.
#[derive(Clone)]
pub struct HttpStorefrontApi {
    client: Client,
    base_url: String,
}

impl HttpStorefrontApi {
    pub fn new(base_url: &url::Url, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpStorefrontApi {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn with_cart_context(builder: RequestBuilder, ctx: &CartContext) -> RequestBuilder {
        match ctx {
            CartContext::Account(token) => with_auth(builder, token),
            CartContext::Guest(guest_id) => {
                builder.header(GUEST_CART_HEADER.clone(), guest_id.to_string())
            }
        }
    }
}

fn with_auth(builder: RequestBuilder, token: &AuthToken) -> RequestBuilder {
    builder.header(reqwest::header::AUTHORIZATION, token.header_value())
}

/// Wyciąga komunikat błędu z treści odpowiedzi (`error` albo `message`).
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "message"].iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    })
}

/// Zamienia status błędu na [`AppError`]. 401 zawsze kończy sesję.
async fn check_status(resp: Response) -> Result<Response, AppError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == StatusCode::UNAUTHORIZED {
        tracing::warn!("API sklepu odrzuciło token (401) dla {}", resp.url());
        return Err(AppError::SessionExpired);
    }

    let url = resp.url().clone();
    let error_text = resp
        .text()
        .await
        .unwrap_or_else(|_| "Brak treści błędu".to_string());
    tracing::error!(
        "Błąd API sklepu: {} Status={}, Treść={}",
        url,
        status,
        error_text
    );

    Err(AppError::UpstreamStatus {
        status: status.as_u16(),
        message: extract_error_message(&error_text).unwrap_or_else(|| GENERIC_FAILURE.to_string()),
    })
}

async fn parse_json<T: DeserializeOwned>(resp: Response) -> Result<T, AppError> {
    let resp = check_status(resp).await?;
    resp.json::<T>().await.map_err(|e| {
        tracing::error!("Błąd deserializacji odpowiedzi API sklepu: {}", e);
        AppError::InternalServerError(
            "Nie można przetworzyć odpowiedzi z serwera sklepu.".to_string(),
        )
    })
}

#[async_trait]
impl StorefrontApi for HttpStorefrontApi {
    async fn list_products(
        &self,
        params: &ListingParams,
    ) -> Result<PaginatedResponse<Product>, AppError> {
        let query = params.to_upstream_query();
        tracing::debug!("Pobieranie produktów z API: {:?}", query);
        let resp = self
            .client
            .get(self.url("products"))
            .query(&query)
            .send()
            .await?;
        parse_json(resp).await
    }

    async fn get_product(&self, product_id: &str) -> Result<Product, AppError> {
        let resp = self
            .client
            .get(self.url(&format!("products/{}", encode(product_id))))
            .send()
            .await?;
        parse_json(resp).await
    }

    async fn list_cafes(&self) -> Result<Vec<Cafe>, AppError> {
        let resp = self.client.get(self.url("cafes")).send().await?;
        parse_json(resp).await
    }

    async fn get_cart(&self, ctx: &CartContext) -> Result<Cart, AppError> {
        let builder = self.client.get(self.url("cart"));
        let resp = Self::with_cart_context(builder, ctx).send().await?;
        parse_json(resp).await
    }

    async fn add_to_cart(
        &self,
        ctx: &CartContext,
        payload: &AddToCartPayload,
    ) -> Result<Cart, AppError> {
        let builder = self.client.post(self.url("cart/items")).json(payload);
        let resp = Self::with_cart_context(builder, ctx).send().await?;
        parse_json(resp).await
    }

    async fn remove_from_cart(
        &self,
        ctx: &CartContext,
        product_id: &str,
    ) -> Result<Cart, AppError> {
        let builder = self
            .client
            .delete(self.url(&format!("cart/items/{}", encode(product_id))));
        let resp = Self::with_cart_context(builder, ctx).send().await?;
        parse_json(resp).await
    }

    async fn clear_cart(&self, ctx: &CartContext) -> Result<(), AppError> {
        let builder = self.client.delete(self.url("cart"));
        let resp = Self::with_cart_context(builder, ctx).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn checkout(
        &self,
        ctx: &CartContext,
        order: &OrderRequest,
    ) -> Result<CheckoutResponse, AppError> {
        tracing::info!(
            "Wysyłanie zamówienia dla koszyka {} ({} sztuk)",
            order.cart_id,
            order.selections.len()
        );
        let builder = self.client.post(self.url("checkout")).json(order);
        let resp = Self::with_cart_context(builder, ctx).send().await?;
        let resp = check_status(resp).await?;

        // Część wdrożeń API odpowiada pustym 201
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(CheckoutResponse::default());
        }
        Ok(serde_json::from_str(&body).unwrap_or_else(|e| {
            tracing::warn!("Nieoczekiwana odpowiedź checkout ({}), zamówienie przyjęte", e);
            CheckoutResponse::default()
        }))
    }

    async fn login(&self, payload: &LoginPayload) -> Result<LoginResponse, AppError> {
        let resp = self
            .client
            .post(self.url("auth/login"))
            .json(payload)
            .send()
            .await?;

        // Tutaj 401 oznacza złe dane logowania, a nie wygasłą sesję
        if resp.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("Nieudane logowanie dla: {}", payload.email);
            return Err(AppError::UnprocessableEntity(
                "Nieprawidłowe dane logowania".to_string(),
            ));
        }
        parse_json(resp).await
    }

    async fn create_product(
        &self,
        auth: &AuthToken,
        payload: &ProductPayload,
    ) -> Result<Product, AppError> {
        let builder = self.client.post(self.url("admin/products")).json(payload);
        let resp = with_auth(builder, auth).send().await?;
        parse_json(resp).await
    }

    async fn update_product(
        &self,
        auth: &AuthToken,
        product_id: &str,
        payload: &ProductPayload,
    ) -> Result<Product, AppError> {
        let builder = self
            .client
            .patch(self.url(&format!("admin/products/{}", encode(product_id))))
            .json(payload);
        let resp = with_auth(builder, auth).send().await?;
        parse_json(resp).await
    }

    async fn delete_product(&self, auth: &AuthToken, product_id: &str) -> Result<(), AppError> {
        let builder = self
            .client
            .delete(self.url(&format!("admin/products/{}", encode(product_id))));
        let resp = with_auth(builder, auth).send().await?;
        check_status(resp).await?;
        Ok(())
    }
}
