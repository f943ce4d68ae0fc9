//! End-to-end tests for Tillbox.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database and apply migrations
//! tillbox migrate
//!
//! # Start both servers. Each shopper client sends its own
//! # X-Forwarded-For address, so the cart limiter sees separate clients.
//! cargo run -p tillbox-admin &
//! STOREFRONT_TRUST_PROXY=true cargo run -p tillbox-storefront &
//!
//! # Run the ignored end-to-end tests
//! ADMIN_API_TOKEN=... cargo test -p tillbox-integration-tests -- --ignored
//! ```
//!
//! Every test creates its own store under a random slug, so runs never
//! collide with each other or with seeded data.

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Base URL for the management API (`ADMIN_BASE_URL`).
#[must_use]
pub fn admin_base_url() -> String {
    std::env::var("ADMIN_BASE_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// Base URL for the storefront API (`STOREFRONT_BASE_URL`).
#[must_use]
pub fn storefront_base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A unique slug for a throwaway store.
#[must_use]
pub fn unique_slug(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", suffix.get(..12).unwrap_or(&suffix))
}

/// Parse a decimal string from a JSON body.
///
/// # Panics
///
/// Panics if `value` is not a decimal string.
#[must_use]
pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("expected a decimal string, got {value}"))
}

/// Parse a decimal literal for comparisons.
///
/// # Panics
///
/// Panics if `s` is not a decimal.
#[must_use]
pub fn money(s: &str) -> rust_decimal::Decimal {
    s.parse()
        .unwrap_or_else(|e| panic!("invalid decimal {s:?}: {e}"))
}

/// Client for the management API with the bearer token attached.
pub struct AdminClient {
    client: Client,
    base_url: String,
    token: String,
}

impl AdminClient {
    /// Build from `ADMIN_BASE_URL` and `ADMIN_API_TOKEN`.
    ///
    /// # Panics
    ///
    /// Panics if `ADMIN_API_TOKEN` is unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            client: Client::new(),
            base_url: admin_base_url(),
            token: std::env::var("ADMIN_API_TOKEN")
                .unwrap_or_else(|_| panic!("ADMIN_API_TOKEN must be set")),
        }
    }

    /// Raw client, for requests that should not carry the token.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET with the token.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .unwrap_or_else(|e| panic!("GET {path} failed: {e}"))
    }

    /// POST a JSON body with the token.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .unwrap_or_else(|e| panic!("POST {path} failed: {e}"))
    }

    /// PATCH a JSON body with the token.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn patch(&self, path: &str, body: &Value) -> Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .unwrap_or_else(|e| panic!("PATCH {path} failed: {e}"))
    }

    /// POST and expect `201 Created`, returning the body.
    ///
    /// # Panics
    ///
    /// Panics on any other status.
    pub async fn create(&self, path: &str, body: &Value) -> Value {
        let resp = self.post(path, body).await;
        expect_json(resp, StatusCode::CREATED).await
    }

    /// Create a store and return its id and slug.
    pub async fn create_store(&self, name: &str) -> (i64, String) {
        let slug = unique_slug("it");
        let store = self
            .create(
                "/api/stores",
                &serde_json::json!({ "name": name, "slug": slug, "currency": "USD" }),
            )
            .await;
        (id_of(&store), slug)
    }
}

/// Client for the storefront that keeps the session cookie.
///
/// Every client forwards its own random private address, so a storefront
/// started with `STOREFRONT_TRUST_PROXY=true` rate limits each one apart.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn shopper_client() -> Client {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", forwarded_address());
    Client::builder()
        .cookie_store(true)
        .default_headers(headers)
        .build()
        .unwrap_or_else(|e| panic!("Failed to create HTTP client: {e}"))
}

fn forwarded_address() -> HeaderValue {
    let [a, b, c, ..] = uuid::Uuid::new_v4().into_bytes();
    HeaderValue::from_str(&format!("10.{a}.{b}.{c}"))
        .unwrap_or_else(|e| panic!("invalid forwarded address: {e}"))
}

/// Assert the status and decode the JSON body.
///
/// # Panics
///
/// Panics if the status differs or the body is not JSON.
pub async fn expect_json<T: DeserializeOwned>(resp: Response, status: StatusCode) -> T {
    let actual = resp.status();
    let body = resp.text().await.unwrap_or_default();
    assert_eq!(actual, status, "unexpected status, body: {body}");
    serde_json::from_str(&body).unwrap_or_else(|e| panic!("invalid JSON ({e}): {body}"))
}

/// Numeric `id` of a created resource.
///
/// # Panics
///
/// Panics if the body has no numeric `id`.
#[must_use]
pub fn id_of(value: &Value) -> i64 {
    value["id"]
        .as_i64()
        .unwrap_or_else(|| panic!("missing id in {value}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_slug_is_valid() {
        let slug = unique_slug("it");
        assert!(tillbox_core::Slug::parse(&slug).is_ok());
        assert_ne!(slug, unique_slug("it"));
    }

    #[test]
    fn test_forwarded_address_is_private() {
        let value = forwarded_address();
        let ip: std::net::Ipv4Addr = value.to_str().unwrap().parse().unwrap();
        assert!(ip.is_private());
    }

    #[test]
    fn test_decimal() {
        assert_eq!(decimal(&Value::from("5.99")), money("5.990"));
    }
}
