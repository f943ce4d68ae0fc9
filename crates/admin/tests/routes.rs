//! In-process router tests for the management API.
//!
//! The router is driven with `tower::ServiceExt::oneshot` over a lazy pool
//! that never connects, so only paths that fail before touching the
//! database are exercised here.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use tillbox_admin::config::AdminConfig;
use tillbox_admin::state::AppState;

const TOKEN: &str = "kP9#vX2$mQ7!rL4@tW8&zN3*bY6^cH1d";

fn make_router() -> axum::Router {
    let config = AdminConfig {
        database_url: SecretString::from("postgres://tillbox@localhost:1/tillbox_test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 3001,
        api_token: SecretString::from(TOKEN),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 1.0,
        json_logs: false,
    };
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://tillbox@localhost:1/tillbox_test")
        .unwrap();
    tillbox_admin::app(AppState::new(config, pool))
}

async fn call(req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let resp = make_router().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

fn authed(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap()
}

#[tokio::test]
async fn health_is_open() {
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let (status, headers, body) = call(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn upstream_request_id_is_echoed() {
    let req = Request::get("/health")
        .header("x-request-id", "edge-1234")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = call(req).await;
    assert_eq!(headers.get("x-request-id").unwrap(), "edge-1234");
}

#[tokio::test]
async fn api_requires_token() {
    let req = Request::get("/api/stores").body(Body::empty()).unwrap();
    let (status, _, body) = call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("missing bearer token"));
}

#[tokio::test]
async fn api_rejects_wrong_token() {
    let req = Request::get("/api/stores/1/products")
        .header(header::AUTHORIZATION, "Bearer not-the-right-token")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_store_payload_is_unprocessable() {
    let req = authed("POST", "/api/stores", Body::from(r#"{"name":"   "}"#));
    let (status, _, body) = call(req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn token_is_checked_before_store_lookup() {
    let req = Request::get("/api/stores/999/categories")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_numeric_store_id_is_bad_request() {
    let req = authed(
        "GET",
        "/api/stores/harbor/shipping/quote?country=US",
        Body::empty(),
    );
    let (status, _, _) = call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let req = authed("GET", "/api/nope", Body::empty());
    let (status, _, _) = call(req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
