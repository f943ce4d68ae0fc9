//! Store (tenant) persistence.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use tillbox_core::catalog::Store;
use tillbox_core::{Slug, StoreId};

use super::{RepositoryError, parse_column};
use crate::models::store::StoreFields;

const STORE_COLUMNS: &str = "id, name, slug, currency, contact_email, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StoreRow {
    id: i32,
    name: String,
    slug: String,
    currency: String,
    contact_email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StoreRow> for Store {
    type Error = RepositoryError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: StoreId::new(row.id),
            name: row.name,
            slug: Slug::parse(&row.slug)
                .map_err(|e| RepositoryError::DataCorruption(format!("store slug: {e}")))?,
            currency: parse_column(&row.currency)?,
            contact_email: row.contact_email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for stores.
pub struct StoreRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StoreRepository<'a> {
    /// Create a new repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all stores, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Store>, RepositoryError> {
        let rows: Vec<StoreRow> =
            sqlx::query_as(&format!("SELECT {STORE_COLUMNS} FROM commerce.store ORDER BY id"))
                .fetch_all(self.pool)
                .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a store by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such store exists.
    pub async fn get(&self, id: StoreId) -> Result<Store, RepositoryError> {
        let row: Option<StoreRow> = sqlx::query_as(&format!(
            "SELECT {STORE_COLUMNS} FROM commerce.store WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Get a store by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such store exists.
    pub async fn get_by_slug(&self, slug: &Slug) -> Result<Store, RepositoryError> {
        let row: Option<StoreRow> = sqlx::query_as(&format!(
            "SELECT {STORE_COLUMNS} FROM commerce.store WHERE slug = $1"
        ))
        .bind(slug.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Create a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, fields: &StoreFields) -> Result<Store, RepositoryError> {
        let row: StoreRow = sqlx::query_as(&format!(
            r"
            INSERT INTO commerce.store (name, slug, currency, contact_email)
            VALUES ($1, $2, $3, $4)
            RETURNING {STORE_COLUMNS}
            "
        ))
        .bind(&fields.name)
        .bind(fields.slug.as_str())
        .bind(fields.currency.code())
        .bind(&fields.contact_email)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "store slug"))?;
        row.try_into()
    }

    /// Replace a store's editable columns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(&self, id: StoreId, fields: &StoreFields) -> Result<Store, RepositoryError> {
        let row: Option<StoreRow> = sqlx::query_as(&format!(
            r"
            UPDATE commerce.store
            SET name = $2, slug = $3, currency = $4, contact_email = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {STORE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&fields.name)
        .bind(fields.slug.as_str())
        .bind(fields.currency.code())
        .bind(&fields.contact_email)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "store slug"))?;
        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Delete a store and everything it owns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such store exists.
    pub async fn delete(&self, id: StoreId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM commerce.store WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
