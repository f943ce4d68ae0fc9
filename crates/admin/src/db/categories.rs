//! Category persistence.
//!
//! Parent links must stay inside one store and must never form a loop; both
//! are checked inside the write transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use tillbox_core::catalog::{Category, would_create_cycle};
use tillbox_core::{CategoryId, Slug, StoreId};

use super::{RepositoryError, ensure_owned};
use crate::models::category::CategoryFields;

const CATEGORY_COLUMNS: &str =
    "id, store_id, name, slug, description, parent_id, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    store_id: i32,
    name: String,
    slug: String,
    description: Option<String>,
    parent_id: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = RepositoryError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CategoryId::new(row.id),
            store_id: StoreId::new(row.store_id),
            name: row.name,
            slug: Slug::parse(&row.slug)
                .map_err(|e| RepositoryError::DataCorruption(format!("category slug: {e}")))?,
            description: row.description,
            parent_id: row.parent_id.map(CategoryId::new),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for categories.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a store's categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, store_id: StoreId) -> Result<Vec<Category>, RepositoryError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM commerce.category WHERE store_id = $1 ORDER BY name, id"
        ))
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get one category of a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category is not in the store.
    pub async fn get(&self, store_id: StoreId, id: CategoryId) -> Result<Category, RepositoryError> {
        let row: Option<CategoryRow> = sqlx::query_as(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM commerce.category WHERE store_id = $1 AND id = $2"
        ))
        .bind(store_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the parent is not in the store,
    /// or `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        store_id: StoreId,
        fields: &CategoryFields,
    ) -> Result<Category, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(parent) = fields.parent_id {
            ensure_owned(&mut tx, "category", store_id, &[parent.as_i32()]).await?;
        }

        let row: CategoryRow = sqlx::query_as(&format!(
            r"
            INSERT INTO commerce.category (store_id, name, slug, description, parent_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(&fields.name)
        .bind(fields.slug.as_str())
        .bind(&fields.description)
        .bind(fields.parent_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "category slug"))?;

        tx.commit().await?;
        row.try_into()
    }

    /// Replace a category's editable columns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for unknown ids and
    /// `RepositoryError::Conflict` for duplicate slugs or parent loops.
    pub async fn update(
        &self,
        store_id: StoreId,
        id: CategoryId,
        fields: &CategoryFields,
    ) -> Result<Category, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(parent) = fields.parent_id {
            ensure_owned(&mut tx, "category", store_id, &[parent.as_i32()]).await?;
            let parents = parent_map(&mut tx, store_id).await?;
            if would_create_cycle(&parents, id, Some(parent)) {
                return Err(RepositoryError::Conflict(
                    "category cannot be its own ancestor".to_owned(),
                ));
            }
        }

        let row: Option<CategoryRow> = sqlx::query_as(&format!(
            r"
            UPDATE commerce.category
            SET name = $3, slug = $4, description = $5, parent_id = $6, updated_at = NOW()
            WHERE store_id = $1 AND id = $2
            RETURNING {CATEGORY_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(id)
        .bind(&fields.name)
        .bind(fields.slug.as_str())
        .bind(&fields.description)
        .bind(fields.parent_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "category slug"))?;

        let category = row.ok_or(RepositoryError::NotFound)?.try_into()?;
        tx.commit().await?;
        Ok(category)
    }

    /// Delete a category. Children become roots and products lose the category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category is not in the store.
    pub async fn delete(&self, store_id: StoreId, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM commerce.category WHERE store_id = $1 AND id = $2")
            .bind(store_id)
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Load every category's parent for cycle checks. Rows are locked until commit.
async fn parent_map(
    conn: &mut PgConnection,
    store_id: StoreId,
) -> Result<HashMap<CategoryId, Option<CategoryId>>, RepositoryError> {
    let rows: Vec<(i32, Option<i32>)> = sqlx::query_as(
        "SELECT id, parent_id FROM commerce.category WHERE store_id = $1 FOR UPDATE",
    )
    .bind(store_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, parent)| (CategoryId::new(id), parent.map(CategoryId::new)))
        .collect())
}
