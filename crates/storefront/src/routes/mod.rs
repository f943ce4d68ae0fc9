//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health, /health/ready
//!
//! # Catalog
//! GET    /api/stores/{slug}
//! GET    /api/stores/{slug}/categories
//! GET    /api/stores/{slug}/collections
//! GET    /api/stores/{slug}/collections/{collection_slug}
//! GET    /api/stores/{slug}/products?category=&collection=&q=&limit=&offset=
//! GET    /api/stores/{slug}/products/{product_slug}
//!
//! # Cart (session scoped; writes are rate limited)
//! GET    /api/stores/{slug}/cart                       DELETE
//! POST   /api/stores/{slug}/cart/items
//! PATCH  /api/stores/{slug}/cart/items/{product_id}    DELETE
//! PUT    /api/stores/{slug}/cart/address
//! GET    /api/stores/{slug}/cart/shipping-rates
//! PUT    /api/stores/{slug}/cart/shipping
//! ```

pub mod cart;
pub mod collections;
pub mod products;
pub mod stores;

use axum::{
    Router,
    handler::Handler,
    routing::{get, patch, post, put},
};

use crate::middleware::cart_rate_limiter;
use crate::state::AppState;

/// Build the `/api` router.
///
/// `trust_proxy` decides whether the cart limiter keys on forwarding headers.
pub fn api_routes(trust_proxy: bool) -> Router<AppState> {
    Router::new()
        .route("/stores/{slug}", get(stores::show))
        .nest("/stores/{slug}", store_routes(trust_proxy))
}

fn store_routes(trust_proxy: bool) -> Router<AppState> {
    let limiter = cart_rate_limiter(trust_proxy);

    Router::new()
        // Catalog
        .route("/categories", get(stores::categories))
        .route("/collections", get(collections::list))
        .route("/collections/{collection_slug}", get(collections::show))
        .route("/products", get(products::list))
        .route("/products/{product_slug}", get(products::show))
        // Cart
        .route(
            "/cart",
            get(cart::show).delete(cart::clear.layer(limiter.clone())),
        )
        .route("/cart/items", post(cart::add_item.layer(limiter.clone())))
        .route(
            "/cart/items/{product_id}",
            patch(cart::update_item.layer(limiter.clone()))
                .delete(cart::remove_item.layer(limiter.clone())),
        )
        .route("/cart/address", put(cart::set_address.layer(limiter.clone())))
        .route("/cart/shipping-rates", get(cart::shipping_rates))
        .route("/cart/shipping", put(cart::select_shipping.layer(limiter)))
}
