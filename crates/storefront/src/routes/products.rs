//! Product route handlers and the priced product view.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use tillbox_core::catalog::{Product, ProductFilter, Store};
use tillbox_core::pricing::{AppliedDiscount, PricedProduct, apply_discounts_to_products};
use tillbox_core::{ProductStatus, Slug, cart};

use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// A product as shoppers see it: catalog fields plus today's price.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    /// Price after discounts; equals `price` when nothing applies.
    pub sale_price: Decimal,
    pub applied_discounts: Vec<AppliedDiscount>,
    /// Most units one cart may hold right now.
    pub max_orderable: i32,
}

/// Listing query. `category` and `collection` are slugs.
#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
    pub category: Option<String>,
    pub collection: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Price products against the store's current discounts.
pub(crate) async fn price_products(
    state: &AppState,
    store: &Store,
    products: Vec<Product>,
) -> Result<Vec<ProductView>> {
    let discounts = state.cache().discounts(state.pool(), store.id).await?;
    let priced: Vec<PricedProduct> = products.iter().map(PricedProduct::from).collect();
    let prices = apply_discounts_to_products(&priced, &discounts, Utc::now());

    Ok(products
        .into_iter()
        .zip(prices)
        .map(|(product, price)| ProductView {
            max_orderable: cart::max_orderable(product.inventory_quantity),
            sale_price: price.final_price,
            applied_discounts: price.applied,
            product,
        })
        .collect())
}

/// Active products, newest first.
///
/// An unknown `category` or `collection` slug matches nothing.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ProductsQuery>,
) -> Result<Json<Vec<ProductView>>> {
    let store = state.store(&slug).await?;
    let catalog = CatalogRepository::new(state.pool());

    let mut filter = ProductFilter {
        status: Some(ProductStatus::Active),
        query: query.q,
        limit: query.limit,
        offset: query.offset,
        ..ProductFilter::default()
    };

    if let Some(category) = query.category.as_deref() {
        let found = match Slug::parse(category) {
            Ok(category) => catalog.category_by_slug(store.id, &category).await?,
            Err(_) => None,
        };
        let Some(found) = found else {
            return Ok(Json(Vec::new()));
        };
        filter.category_id = Some(found.id);
    }

    if let Some(collection) = query.collection.as_deref() {
        let found = match Slug::parse(collection) {
            Ok(collection) => {
                catalog
                    .published_collection_by_slug(store.id, &collection)
                    .await?
            }
            Err(_) => None,
        };
        let Some(found) = found else {
            return Ok(Json(Vec::new()));
        };
        filter.collection_id = Some(found.id);
    }

    let products = catalog.active_products(store.id, &filter).await?;
    Ok(Json(price_products(&state, &store, products).await?))
}

#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path((slug, product_slug)): Path<(String, String)>,
) -> Result<Json<ProductView>> {
    let store = state.store(&slug).await?;
    let not_found = || AppError::NotFound(format!("product {product_slug}"));

    let parsed = Slug::parse(&product_slug).map_err(|_| not_found())?;
    let product = CatalogRepository::new(state.pool())
        .active_product_by_slug(store.id, &parsed)
        .await?
        .ok_or_else(not_found)?;

    price_products(&state, &store, vec![product])
        .await?
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::Internal("pricing dropped a product".to_string()))
}
