//! Collection route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tillbox_core::Slug;
use tillbox_core::catalog::{Collection, ProductFilter};

use super::products::{ProductView, price_products};
use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// A published collection with a page of its active products.
#[derive(Debug, Serialize)]
pub struct CollectionView {
    #[serde(flatten)]
    pub collection: Collection,
    pub products: Vec<ProductView>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Published collections, by name.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<Collection>>> {
    let store = state.store(&slug).await?;
    let collections = CatalogRepository::new(state.pool())
        .published_collections(store.id)
        .await?;
    Ok(Json(collections))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path((slug, collection_slug)): Path<(String, String)>,
    Query(page): Query<PageQuery>,
) -> Result<Json<CollectionView>> {
    let store = state.store(&slug).await?;
    let not_found = || AppError::NotFound(format!("collection {collection_slug}"));
    let catalog = CatalogRepository::new(state.pool());

    let parsed = Slug::parse(&collection_slug).map_err(|_| not_found())?;
    let collection = catalog
        .published_collection_by_slug(store.id, &parsed)
        .await?
        .ok_or_else(not_found)?;

    let filter = ProductFilter {
        collection_id: Some(collection.id),
        limit: page.limit,
        offset: page.offset,
        ..ProductFilter::default()
    };
    let products = catalog.active_products(store.id, &filter).await?;

    Ok(Json(CollectionView {
        products: price_products(&state, &store, products).await?,
        collection,
    }))
}
