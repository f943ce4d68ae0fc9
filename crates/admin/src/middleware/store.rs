//! Store resolution for store-scoped routes.

use std::collections::HashMap;

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};

use tillbox_core::StoreId;

use crate::db::StoreRepository;
use crate::error::AppError;
use crate::state::AppState;

/// Reject requests under `/stores/{store_id}/...` for a store that does not
/// exist.
///
/// A `store_id` that is not an integer is left for the handler's `Path`
/// extractor to reject.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown store, or a database error.
pub async fn require_store(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(store_id) = params.get("store_id").and_then(|raw| raw.parse().ok()) {
        StoreRepository::new(state.pool())
            .get(StoreId::new(store_id))
            .await?;
    }
    Ok(next.run(request).await)
}
