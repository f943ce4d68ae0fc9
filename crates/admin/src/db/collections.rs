//! Collection persistence and product membership.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use tillbox_core::catalog::Collection;
use tillbox_core::{CollectionId, ProductId, Slug, StoreId};

use super::{RepositoryError, ensure_owned};
use crate::models::collection::CollectionFields;

const COLLECTION_COLUMNS: &str =
    "id, store_id, name, slug, description, is_published, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CollectionRow {
    id: i32,
    store_id: i32,
    name: String,
    slug: String,
    description: Option<String>,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CollectionRow> for Collection {
    type Error = RepositoryError;

    fn try_from(row: CollectionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CollectionId::new(row.id),
            store_id: StoreId::new(row.store_id),
            name: row.name,
            slug: Slug::parse(&row.slug)
                .map_err(|e| RepositoryError::DataCorruption(format!("collection slug: {e}")))?,
            description: row.description,
            is_published: row.is_published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for collections.
pub struct CollectionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CollectionRepository<'a> {
    /// Create a new repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a store's collections by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, store_id: StoreId) -> Result<Vec<Collection>, RepositoryError> {
        let rows: Vec<CollectionRow> = sqlx::query_as(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM commerce.collection WHERE store_id = $1 ORDER BY name, id"
        ))
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get one collection of a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the collection is not in the store.
    pub async fn get(
        &self,
        store_id: StoreId,
        id: CollectionId,
    ) -> Result<Collection, RepositoryError> {
        let row: Option<CollectionRow> = sqlx::query_as(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM commerce.collection WHERE store_id = $1 AND id = $2"
        ))
        .bind(store_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Create a collection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        store_id: StoreId,
        fields: &CollectionFields,
    ) -> Result<Collection, RepositoryError> {
        let row: CollectionRow = sqlx::query_as(&format!(
            r"
            INSERT INTO commerce.collection (store_id, name, slug, description, is_published)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COLLECTION_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(&fields.name)
        .bind(fields.slug.as_str())
        .bind(&fields.description)
        .bind(fields.is_published)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "collection slug"))?;
        row.try_into()
    }

    /// Replace a collection's editable columns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(
        &self,
        store_id: StoreId,
        id: CollectionId,
        fields: &CollectionFields,
    ) -> Result<Collection, RepositoryError> {
        let row: Option<CollectionRow> = sqlx::query_as(&format!(
            r"
            UPDATE commerce.collection
            SET name = $3, slug = $4, description = $5, is_published = $6, updated_at = NOW()
            WHERE store_id = $1 AND id = $2
            RETURNING {COLLECTION_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(id)
        .bind(&fields.name)
        .bind(fields.slug.as_str())
        .bind(&fields.description)
        .bind(fields.is_published)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "collection slug"))?;
        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Delete a collection. Memberships and discount targets go with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the collection is not in the store.
    pub async fn delete(&self, store_id: StoreId, id: CollectionId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM commerce.collection WHERE store_id = $1 AND id = $2")
                .bind(store_id)
                .bind(id)
                .execute(self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Add a product to a collection. Adding twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if either side is not in the store.
    pub async fn add_product(
        &self,
        store_id: StoreId,
        id: CollectionId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ensure_owned(&mut tx, "collection", store_id, &[id.as_i32()]).await?;
        ensure_owned(&mut tx, "product", store_id, &[product_id.as_i32()]).await?;

        sqlx::query(
            r"
            INSERT INTO commerce.product_collection (product_id, collection_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(product_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Remove a product from a collection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product was not a member.
    pub async fn remove_product(
        &self,
        store_id: StoreId,
        id: CollectionId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM commerce.product_collection pc
            USING commerce.collection c
            WHERE pc.collection_id = c.id
              AND c.store_id = $1 AND c.id = $2 AND pc.product_id = $3
            ",
        )
        .bind(store_id)
        .bind(id)
        .bind(product_id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
