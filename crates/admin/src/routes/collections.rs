//! Collection route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use tillbox_core::catalog::Collection;
use tillbox_core::{CollectionId, ProductId, StoreId};

use crate::db::CollectionRepository;
use crate::error::AppError;
use crate::models::collection::{CreateCollectionInput, UpdateCollectionInput};
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
) -> Result<Json<Vec<Collection>>, AppError> {
    Ok(Json(CollectionRepository::new(state.pool()).list(store_id).await?))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, CollectionId)>,
) -> Result<Json<Collection>, AppError> {
    Ok(Json(CollectionRepository::new(state.pool()).get(store_id, id).await?))
}

#[instrument(skip(state, input))]
pub async fn create(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
    Json(input): Json<CreateCollectionInput>,
) -> Result<(StatusCode, Json<Collection>), AppError> {
    let fields = input.validate()?;
    let collection = CollectionRepository::new(state.pool())
        .create(store_id, &fields)
        .await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

#[instrument(skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, CollectionId)>,
    Json(input): Json<UpdateCollectionInput>,
) -> Result<Json<Collection>, AppError> {
    let repo = CollectionRepository::new(state.pool());
    let current = repo.get(store_id, id).await?;
    let fields = input.apply(&current)?;
    Ok(Json(repo.update(store_id, id, &fields).await?))
}

#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, CollectionId)>,
) -> Result<StatusCode, AppError> {
    CollectionRepository::new(state.pool()).delete(store_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Put a product into a collection. Idempotent.
#[instrument(skip(state))]
pub async fn add_product(
    State(state): State<AppState>,
    Path((store_id, id, product_id)): Path<(StoreId, CollectionId, ProductId)>,
) -> Result<StatusCode, AppError> {
    CollectionRepository::new(state.pool())
        .add_product(store_id, id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn remove_product(
    State(state): State<AppState>,
    Path((store_id, id, product_id)): Path<(StoreId, CollectionId, ProductId)>,
) -> Result<StatusCode, AppError> {
    CollectionRepository::new(state.pool())
        .remove_product(store_id, id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
