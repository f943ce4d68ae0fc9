//! Read-mostly database access for the storefront.
//!
//! # Schema: `commerce`
//!
//! Shared with the admin service. The storefront reads the catalog, discounts
//! and shipping configuration, and owns the `cart` and `cart_item` tables.
//! Sessions live in `tower_sessions.session` (created by `tillbox migrate`).

pub mod carts;
pub mod catalog;
pub mod shipping;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::{CartRecord, CartRepository};
pub use catalog::CatalogRepository;
pub use shipping::{ShippingConfig, load_shipping_config};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Parse a `TEXT` column through `FromStr`.
pub(crate) fn parse_column<T>(value: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| RepositoryError::DataCorruption(e.to_string()))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
