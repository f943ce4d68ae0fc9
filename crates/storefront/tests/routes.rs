//! In-process router tests for the storefront.
//!
//! The router runs over a lazy pool that never connects and an in-memory
//! session store, so only paths that finish before touching the database are
//! exercised here. Cart writes are rate limited by client IP, so those
//! requests carry the peer address `axum::serve` would attach.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ConnectInfo;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use tower_sessions::MemoryStore;
use url::Url;

use tillbox_storefront::config::StorefrontConfig;
use tillbox_storefront::state::AppState;

fn make_router() -> axum::Router {
    let config = StorefrontConfig {
        database_url: SecretString::from("postgres://tillbox@localhost:1/tillbox_test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 3000,
        base_url: Url::parse("http://localhost:3000").unwrap(),
        session_secret: SecretString::from("kP9#vR2$mX7!qL4@nB8&wT1*zC5^hJ3%"),
        catalog_cache_ttl: Duration::from_secs(60),
        trust_proxy: false,
        sentry_dsn: None,
        sentry_environment: None,
        json_logs: false,
    };
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://tillbox@localhost:1/tillbox_test")
        .unwrap();
    tillbox_storefront::app(AppState::new(config, pool), MemoryStore::default())
}

async fn call(
    router: axum::Router,
    req: Request<Body>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

fn peer(addr: &str) -> ConnectInfo<SocketAddr> {
    ConnectInfo(addr.parse().unwrap())
}

fn shopper(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(peer("203.0.113.50:40000"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

fn add_item_request() -> Request<Body> {
    shopper(
        "POST",
        "/api/stores/NOPE/cart/items",
        r#"{"product_id":1,"quantity":1}"#,
    )
}

fn error_message(body: &[u8]) -> String {
    let json: serde_json::Value = serde_json::from_slice(body).unwrap();
    json["error"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn health_carries_request_id_and_security_headers() {
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let (status, headers, body) = call(make_router(), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("cache-control").unwrap(), "no-store");
}

#[tokio::test]
async fn upstream_request_id_is_echoed() {
    let req = Request::get("/health")
        .header("x-request-id", "edge-5678")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = call(make_router(), req).await;
    assert_eq!(headers.get("x-request-id").unwrap(), "edge-5678");
}

#[tokio::test]
async fn malformed_store_slug_is_not_found() {
    let req = Request::get("/api/stores/Not%20A%20Store/products")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = call(make_router(), req).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(error_message(&body).contains("store"));
}

#[tokio::test]
async fn bad_country_code_is_rejected_before_lookup() {
    let req = shopper(
        "PUT",
        "/api/stores/harbor-goods/cart/address",
        r#"{"country_code":"Canada"}"#,
    );
    let (status, _, body) = call(make_router(), req).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(error_message(&body).contains("country_code"));
}

#[tokio::test]
async fn cart_writes_are_rate_limited_per_client() {
    let router = make_router();

    for _ in 0..30 {
        let (status, _, _) = call(router.clone(), add_item_request()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let (status, _, _) = call(router.clone(), add_item_request()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Another peer has its own budget
    let mut req = add_item_request();
    req.extensions_mut().insert(peer("203.0.113.51:40000"));
    let (status, _, _) = call(router.clone(), req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Reads are not limited
    let req = Request::get("/api/stores/NOPE/cart")
        .extension(peer("203.0.113.50:40000"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = call(router, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn forwarded_for_does_not_reset_the_limit() {
    let router = make_router();

    let mut limited = 0;
    for i in 0..100 {
        let mut req = add_item_request();
        req.headers_mut()
            .insert("x-forwarded-for", format!("198.51.100.{i}").parse().unwrap());
        let (status, _, _) = call(router.clone(), req).await;
        if status == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        }
    }

    // 30 burst tokens; anything beyond a refill or two must be refused
    assert!(limited >= 65, "only {limited} of 100 writes were limited");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let req = Request::get("/api/nope").body(Body::empty()).unwrap();
    let (status, _, _) = call(make_router(), req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
