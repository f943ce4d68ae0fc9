//! Database operations for the management API.
//!
//! # Schema: `commerce`
//!
//! Shared with the storefront. Every table below `store` carries (or reaches
//! through its parent) a `store_id`, and every repository method takes the
//! owning store so ids from another tenant resolve to `NotFound`.
//!
//! # Migrations
//!
//! Migrations live in `migrations/` at the workspace root and run via:
//! ```bash
//! cargo run -p tillbox-cli -- migrate
//! ```

pub mod categories;
pub mod collections;
pub mod discounts;
pub mod products;
pub mod shipping;
pub mod stores;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;

use tillbox_core::StoreId;

pub use categories::CategoryRepository;
pub use collections::CollectionRepository;
pub use discounts::DiscountRepository;
pub use products::ProductRepository;
pub use shipping::ShippingRepository;
pub use stores::StoreRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a write failure, turning constraint violations into `Conflict`.
    pub(crate) fn from_write(e: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return Self::Conflict(format!("{what} already exists"));
            }
            if db_err.is_foreign_key_violation() {
                return Self::Conflict(format!("{what} references a missing record"));
            }
            if db_err.is_check_violation() {
                return Self::Conflict(format!("{what} violates a data constraint"));
            }
        }
        Self::Database(e)
    }
}

/// Parse a `TEXT` enum column.
pub(crate) fn parse_column<T>(value: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse().map_err(RepositoryError::DataCorruption)
}

/// Fail with `NotFound` unless every id in `ids` belongs to `store_id`.
///
/// `table` is always a literal from this crate.
pub(crate) async fn ensure_owned(
    conn: &mut PgConnection,
    table: &'static str,
    store_id: StoreId,
    ids: &[i32],
) -> Result<(), RepositoryError> {
    if ids.is_empty() {
        return Ok(());
    }

    let mut distinct = ids.to_vec();
    distinct.sort_unstable();
    distinct.dedup();

    let sql = format!("SELECT COUNT(*) FROM commerce.{table} WHERE store_id = $1 AND id = ANY($2)");
    let (found,): (i64,) = sqlx::query_as(&sql)
        .bind(store_id)
        .bind(&distinct)
        .fetch_one(&mut *conn)
        .await?;

    if usize::try_from(found).ok() == Some(distinct.len()) {
        Ok(())
    } else {
        Err(RepositoryError::NotFound)
    }
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
