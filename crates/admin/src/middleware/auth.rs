//! Bearer-token guard for the management API.
//!
//! There are no admin accounts: every `/api` request must carry
//! `Authorization: Bearer <ADMIN_API_TOKEN>`. Tokens are compared as SHA-256
//! digests so the comparison never depends on the presented length.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::state::AppState;

/// Reject requests without the configured bearer token.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` when the header is missing, malformed,
/// or carries the wrong token.
pub async fn require_api_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

    if !digest_matches(presented, state.api_token_digest()) {
        tracing::warn!(path = %request.uri().path(), "Rejected request with invalid API token");
        return Err(AppError::Unauthorized("invalid bearer token".to_string()));
    }

    Ok(next.run(request).await)
}

/// Extract the token from an `Authorization` header value.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn digest_matches(presented: &str, expected: &[u8; 32]) -> bool {
    let digest = Sha256::digest(presented.as_bytes());
    digest
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
