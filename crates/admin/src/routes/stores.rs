//! Store route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use tillbox_core::StoreId;
use tillbox_core::catalog::Store;

use crate::db::StoreRepository;
use crate::error::AppError;
use crate::models::store::{CreateStoreInput, UpdateStoreInput};
use crate::state::AppState;

/// List all stores.
#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Store>>, AppError> {
    let stores = StoreRepository::new(state.pool()).list().await?;
    Ok(Json(stores))
}

/// Show one store.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
) -> Result<Json<Store>, AppError> {
    Ok(Json(StoreRepository::new(state.pool()).get(store_id).await?))
}

/// Create a store.
#[instrument(skip(state, input))]
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateStoreInput>,
) -> Result<(StatusCode, Json<Store>), AppError> {
    let fields = input.validate()?;
    let store = StoreRepository::new(state.pool()).create(&fields).await?;
    tracing::info!(store_id = %store.id, slug = %store.slug, "Store created");
    Ok((StatusCode::CREATED, Json(store)))
}

/// Patch a store.
#[instrument(skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
    Json(input): Json<UpdateStoreInput>,
) -> Result<Json<Store>, AppError> {
    let repo = StoreRepository::new(state.pool());
    let current = repo.get(store_id).await?;
    let fields = input.apply(&current)?;
    Ok(Json(repo.update(store_id, &fields).await?))
}

/// Delete a store and everything it owns.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
) -> Result<StatusCode, AppError> {
    StoreRepository::new(state.pool()).delete(store_id).await?;
    tracing::info!(%store_id, "Store deleted");
    Ok(StatusCode::NO_CONTENT)
}
