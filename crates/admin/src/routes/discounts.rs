//! Discount route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::instrument;

use tillbox_core::pricing::Discount;
use tillbox_core::{DiscountId, StoreId};

use crate::db::DiscountRepository;
use crate::error::AppError;
use crate::models::discount::{CreateDiscountInput, UpdateDiscountInput};
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
) -> Result<Json<Vec<Discount>>, AppError> {
    Ok(Json(DiscountRepository::new(state.pool()).list(store_id).await?))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, DiscountId)>,
) -> Result<Json<Discount>, AppError> {
    Ok(Json(DiscountRepository::new(state.pool()).get(store_id, id).await?))
}

/// Create a discount. `starts_at` defaults to now.
#[instrument(skip(state, input))]
pub async fn create(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
    Json(input): Json<CreateDiscountInput>,
) -> Result<(StatusCode, Json<Discount>), AppError> {
    let fields = input.validate(Utc::now())?;
    let discount = DiscountRepository::new(state.pool())
        .create(store_id, &fields)
        .await?;
    tracing::info!(
        %store_id,
        discount_id = %discount.id,
        percentage = %discount.percentage,
        "Discount created"
    );
    Ok((StatusCode::CREATED, Json(discount)))
}

/// Patch a discount. Target lists, when present, replace the stored ones.
#[instrument(skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, DiscountId)>,
    Json(input): Json<UpdateDiscountInput>,
) -> Result<Json<Discount>, AppError> {
    let repo = DiscountRepository::new(state.pool());
    let current = repo.get(store_id, id).await?;
    let fields = input.apply(&current)?;
    Ok(Json(repo.update(store_id, id, &fields).await?))
}

#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, DiscountId)>,
) -> Result<StatusCode, AppError> {
    DiscountRepository::new(state.pool()).delete(store_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
