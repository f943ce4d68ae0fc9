//! Product and product image route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use tillbox_core::catalog::{Product, ProductFilter, ProductImage};
use tillbox_core::{ProductId, ProductImageId, StoreId};

use crate::db::ProductRepository;
use crate::error::AppError;
use crate::models::product::{
    AddImageInput, CreateProductInput, ReorderImagesInput, UpdateProductInput,
};
use crate::state::AppState;

/// List products. Accepts `status`, `category_id`, `collection_id`, `query`,
/// `limit` and `offset`.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = ProductRepository::new(state.pool())
        .list(store_id, &filter)
        .await?;
    Ok(Json(products))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, ProductId)>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(ProductRepository::new(state.pool()).get(store_id, id).await?))
}

#[instrument(skip(state, input))]
pub async fn create(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
    Json(input): Json<CreateProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let fields = input.validate()?;
    let product = ProductRepository::new(state.pool())
        .create(store_id, &fields)
        .await?;
    tracing::info!(%store_id, product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, ProductId)>,
    Json(input): Json<UpdateProductInput>,
) -> Result<Json<Product>, AppError> {
    let repo = ProductRepository::new(state.pool());
    let current = repo.get(store_id, id).await?;
    let fields = input.apply(&current)?;
    Ok(Json(repo.update(store_id, id, &fields).await?))
}

#[instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, ProductId)>,
) -> Result<StatusCode, AppError> {
    ProductRepository::new(state.pool()).delete(store_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Attach an image URL. Responds with the product's images in order.
#[instrument(skip(state, input))]
pub async fn add_image(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, ProductId)>,
    Json(input): Json<AddImageInput>,
) -> Result<(StatusCode, Json<Vec<ProductImage>>), AppError> {
    let image = input.validate()?;
    let images = ProductRepository::new(state.pool())
        .add_image(store_id, id, &image)
        .await?;
    Ok((StatusCode::CREATED, Json(images)))
}

#[instrument(skip(state))]
pub async fn delete_image(
    State(state): State<AppState>,
    Path((store_id, id, image_id)): Path<(StoreId, ProductId, ProductImageId)>,
) -> Result<Json<Vec<ProductImage>>, AppError> {
    let images = ProductRepository::new(state.pool())
        .delete_image(store_id, id, image_id)
        .await?;
    Ok(Json(images))
}

/// Reorder images. Ids not listed keep their relative order after the listed ones.
#[instrument(skip(state, input))]
pub async fn reorder_images(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, ProductId)>,
    Json(input): Json<ReorderImagesInput>,
) -> Result<Json<Vec<ProductImage>>, AppError> {
    let images = ProductRepository::new(state.pool())
        .reorder_images(store_id, id, &input.image_ids)
        .await?;
    Ok(Json(images))
}
