//! Discount persistence. Targets are replaced wholesale on every write.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use tillbox_core::pricing::Discount;
use tillbox_core::{CollectionId, DiscountId, ProductId, StoreId, raw_ids};

use super::{RepositoryError, ensure_owned};
use crate::models::discount::DiscountFields;

const DISCOUNT_COLUMNS: &str = "id, store_id, name, percentage, starts_at, ends_at, is_active, \
     is_stackable, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct DiscountRow {
    id: i32,
    store_id: i32,
    name: String,
    percentage: Decimal,
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    is_active: bool,
    is_stackable: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DiscountRow {
    fn into_discount(self, product_ids: Vec<ProductId>, collection_ids: Vec<CollectionId>) -> Discount {
        Discount {
            id: DiscountId::new(self.id),
            store_id: StoreId::new(self.store_id),
            name: self.name,
            percentage: self.percentage,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            is_active: self.is_active,
            is_stackable: self.is_stackable,
            product_ids,
            collection_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Repository for discounts.
pub struct DiscountRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DiscountRepository<'a> {
    /// Create a new repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a store's discounts with their targets.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, store_id: StoreId) -> Result<Vec<Discount>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<DiscountRow> = sqlx::query_as(&format!(
            "SELECT {DISCOUNT_COLUMNS} FROM commerce.discount WHERE store_id = $1 ORDER BY starts_at DESC, id"
        ))
        .bind(store_id)
        .fetch_all(&mut *conn)
        .await?;
        with_targets(&mut conn, rows).await
    }

    /// Get one discount of a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the discount is not in the store.
    pub async fn get(&self, store_id: StoreId, id: DiscountId) -> Result<Discount, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_one(&mut conn, store_id, id).await
    }

    /// Create a discount with its targets.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if a target is not in the store.
    pub async fn create(
        &self,
        store_id: StoreId,
        fields: &DiscountFields,
    ) -> Result<Discount, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        check_targets(&mut tx, store_id, fields).await?;

        let (id,): (i32,) = sqlx::query_as(
            r"
            INSERT INTO commerce.discount (
                store_id, name, percentage, starts_at, ends_at, is_active, is_stackable
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(store_id)
        .bind(&fields.name)
        .bind(fields.percentage)
        .bind(fields.starts_at)
        .bind(fields.ends_at)
        .bind(fields.is_active)
        .bind(fields.is_stackable)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "discount"))?;

        let id = DiscountId::new(id);
        replace_targets(&mut tx, id, fields).await?;

        let discount = fetch_one(&mut tx, store_id, id).await?;
        tx.commit().await?;
        Ok(discount)
    }

    /// Replace a discount's columns and targets.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for unknown ids or foreign targets.
    pub async fn update(
        &self,
        store_id: StoreId,
        id: DiscountId,
        fields: &DiscountFields,
    ) -> Result<Discount, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        check_targets(&mut tx, store_id, fields).await?;

        let result = sqlx::query(
            r"
            UPDATE commerce.discount
            SET name = $3, percentage = $4, starts_at = $5, ends_at = $6,
                is_active = $7, is_stackable = $8, updated_at = NOW()
            WHERE store_id = $1 AND id = $2
            ",
        )
        .bind(store_id)
        .bind(id)
        .bind(&fields.name)
        .bind(fields.percentage)
        .bind(fields.starts_at)
        .bind(fields.ends_at)
        .bind(fields.is_active)
        .bind(fields.is_stackable)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "discount"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        replace_targets(&mut tx, id, fields).await?;

        let discount = fetch_one(&mut tx, store_id, id).await?;
        tx.commit().await?;
        Ok(discount)
    }

    /// Delete a discount.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the discount is not in the store.
    pub async fn delete(&self, store_id: StoreId, id: DiscountId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM commerce.discount WHERE store_id = $1 AND id = $2")
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

async fn check_targets(
    conn: &mut PgConnection,
    store_id: StoreId,
    fields: &DiscountFields,
) -> Result<(), RepositoryError> {
    ensure_owned(conn, "product", store_id, &raw_ids(&fields.product_ids)).await?;
    ensure_owned(conn, "collection", store_id, &raw_ids(&fields.collection_ids)).await
}

async fn replace_targets(
    conn: &mut PgConnection,
    id: DiscountId,
    fields: &DiscountFields,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM commerce.discount_product WHERE discount_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM commerce.discount_collection WHERE discount_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "INSERT INTO commerce.discount_product (discount_id, product_id) SELECT $1, UNNEST($2::int[])",
    )
    .bind(id)
    .bind(raw_ids(&fields.product_ids))
    .execute(&mut *conn)
    .await?;
    sqlx::query(
        "INSERT INTO commerce.discount_collection (discount_id, collection_id) SELECT $1, UNNEST($2::int[])",
    )
    .bind(id)
    .bind(raw_ids(&fields.collection_ids))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn fetch_one(
    conn: &mut PgConnection,
    store_id: StoreId,
    id: DiscountId,
) -> Result<Discount, RepositoryError> {
    let row: Option<DiscountRow> = sqlx::query_as(&format!(
        "SELECT {DISCOUNT_COLUMNS} FROM commerce.discount WHERE store_id = $1 AND id = $2"
    ))
    .bind(store_id)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let row = row.ok_or(RepositoryError::NotFound)?;
    with_targets(conn, vec![row])
        .await?
        .pop()
        .ok_or(RepositoryError::NotFound)
}

async fn with_targets(
    conn: &mut PgConnection,
    rows: Vec<DiscountRow>,
) -> Result<Vec<Discount>, RepositoryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();

    let products: Vec<(i32, i32)> = sqlx::query_as(
        "SELECT discount_id, product_id FROM commerce.discount_product WHERE discount_id = ANY($1) ORDER BY product_id",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;
    let collections: Vec<(i32, i32)> = sqlx::query_as(
        "SELECT discount_id, collection_id FROM commerce.discount_collection WHERE discount_id = ANY($1) ORDER BY collection_id",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut product_map: HashMap<i32, Vec<ProductId>> = HashMap::new();
    for (discount_id, product_id) in products {
        product_map
            .entry(discount_id)
            .or_default()
            .push(ProductId::new(product_id));
    }
    let mut collection_map: HashMap<i32, Vec<CollectionId>> = HashMap::new();
    for (discount_id, collection_id) in collections {
        collection_map
            .entry(discount_id)
            .or_default()
            .push(CollectionId::new(collection_id));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let id = row.id;
            row.into_discount(
                product_map.remove(&id).unwrap_or_default(),
                collection_map.remove(&id).unwrap_or_default(),
            )
        })
        .collect())
}
