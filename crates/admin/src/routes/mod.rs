//! HTTP route handlers for the management API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health, /health/ready
//!
//! # Stores
//! GET    /api/stores                                   POST
//! GET    /api/stores/{store_id}                        PATCH / DELETE
//!
//! # Catalog
//! GET    /api/stores/{store_id}/categories             POST
//! GET    /api/stores/{store_id}/categories/{id}        PATCH / DELETE
//! GET    /api/stores/{store_id}/collections            POST
//! GET    /api/stores/{store_id}/collections/{id}       PATCH / DELETE
//! PUT    /api/stores/{store_id}/collections/{id}/products/{product_id}  DELETE
//! GET    /api/stores/{store_id}/products               POST
//! GET    /api/stores/{store_id}/products/{id}          PATCH / DELETE
//! POST   /api/stores/{store_id}/products/{id}/images
//! DELETE /api/stores/{store_id}/products/{id}/images/{image_id}
//! PUT    /api/stores/{store_id}/products/{id}/images/order
//!
//! # Discounts
//! GET    /api/stores/{store_id}/discounts              POST
//! GET    /api/stores/{store_id}/discounts/{id}         PATCH / DELETE
//!
//! # Shipping
//! GET    /api/stores/{store_id}/shipping/methods       POST
//! GET    /api/stores/{store_id}/shipping/methods/{id}  PATCH / DELETE
//! GET    /api/stores/{store_id}/shipping/zones         POST
//! GET    /api/stores/{store_id}/shipping/zones/{id}    PATCH / DELETE
//! GET    /api/stores/{store_id}/shipping/zones/{zone_id}/rates  POST
//! GET    /api/stores/{store_id}/shipping/rates/{id}    PATCH / DELETE
//! GET    /api/stores/{store_id}/shipping/quote
//! ```

pub mod categories;
pub mod collections;
pub mod discounts;
pub mod products;
pub mod shipping;
pub mod stores;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::middleware::require_store;
use crate::state::AppState;

/// Build the `/api` router. Callers layer the token guard on top.
///
/// Routes nested under a store answer 404 when the store does not exist.
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/stores", get(stores::list).post(stores::create))
        .route(
            "/stores/{store_id}",
            get(stores::show).patch(stores::update).delete(stores::delete),
        )
        .nest(
            "/stores/{store_id}",
            store_routes().route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                require_store,
            )),
        )
}

fn store_routes() -> Router<AppState> {
    Router::new()
        // Categories
        .route("/categories", get(categories::list).post(categories::create))
        .route(
            "/categories/{id}",
            get(categories::show)
                .patch(categories::update)
                .delete(categories::delete),
        )
        // Collections
        .route("/collections", get(collections::list).post(collections::create))
        .route(
            "/collections/{id}",
            get(collections::show)
                .patch(collections::update)
                .delete(collections::delete),
        )
        .route(
            "/collections/{id}/products/{product_id}",
            put(collections::add_product).delete(collections::remove_product),
        )
        // Products
        .route("/products", get(products::list).post(products::create))
        .route(
            "/products/{id}",
            get(products::show)
                .patch(products::update)
                .delete(products::delete),
        )
        .route("/products/{id}/images", post(products::add_image))
        .route("/products/{id}/images/order", put(products::reorder_images))
        .route(
            "/products/{id}/images/{image_id}",
            axum::routing::delete(products::delete_image),
        )
        // Discounts
        .route("/discounts", get(discounts::list).post(discounts::create))
        .route(
            "/discounts/{id}",
            get(discounts::show)
                .patch(discounts::update)
                .delete(discounts::delete),
        )
        // Shipping
        .route(
            "/shipping/methods",
            get(shipping::list_methods).post(shipping::create_method),
        )
        .route(
            "/shipping/methods/{id}",
            get(shipping::show_method)
                .patch(shipping::update_method)
                .delete(shipping::delete_method),
        )
        .route(
            "/shipping/zones",
            get(shipping::list_zones).post(shipping::create_zone),
        )
        .route(
            "/shipping/zones/{id}",
            get(shipping::show_zone)
                .patch(shipping::update_zone)
                .delete(shipping::delete_zone),
        )
        .route(
            "/shipping/zones/{id}/rates",
            get(shipping::list_rates).post(shipping::create_rate),
        )
        .route(
            "/shipping/rates/{id}",
            get(shipping::show_rate)
                .patch(shipping::update_rate)
                .delete(shipping::delete_rate),
        )
        .route("/shipping/quote", get(shipping::quote))
}
