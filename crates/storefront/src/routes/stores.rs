//! Store and category route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use tillbox_core::catalog::{Category, Store};

use crate::db::CatalogRepository;
use crate::error::Result;
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<Store>> {
    Ok(Json(state.store(&slug).await?))
}

/// Every category of the store, by name.
#[instrument(skip(state))]
pub async fn categories(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<Category>>> {
    let store = state.store(&slug).await?;
    let categories = CatalogRepository::new(state.pool())
        .categories(store.id)
        .await?;
    Ok(Json(categories))
}
