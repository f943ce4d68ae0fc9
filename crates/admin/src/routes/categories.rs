//! Category route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use tillbox_core::catalog::Category;
use tillbox_core::{CategoryId, StoreId};

use crate::db::CategoryRepository;
use crate::error::AppError;
use crate::models::category::{CreateCategoryInput, UpdateCategoryInput};
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(CategoryRepository::new(state.pool()).list(store_id).await?))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, CategoryId)>,
) -> Result<Json<Category>, AppError> {
    Ok(Json(CategoryRepository::new(state.pool()).get(store_id, id).await?))
}

#[instrument(skip(state, input))]
pub async fn create(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
    Json(input): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let fields = input.validate()?;
    let category = CategoryRepository::new(state.pool())
        .create(store_id, &fields)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// Patch a category. Moving it under one of its descendants is a 409.
#[instrument(skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, CategoryId)>,
    Json(input): Json<UpdateCategoryInput>,
) -> Result<Json<Category>, AppError> {
    let repo = CategoryRepository::new(state.pool());
    let current = repo.get(store_id, id).await?;
    let fields = input.apply(&current)?;
    Ok(Json(repo.update(store_id, id, &fields).await?))
}

/// Delete a category. Children and products are detached, not deleted.
#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, CategoryId)>,
) -> Result<StatusCode, AppError> {
    CategoryRepository::new(state.pool()).delete(store_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
