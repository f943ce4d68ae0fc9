//! Product, product image and membership persistence.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use tillbox_core::catalog::{Product, ProductFilter, ProductImage, normalize_image_positions, reorder_images};
use tillbox_core::{
    CategoryId, CollectionId, ProductId, ProductImageId, Slug, StoreId, raw_ids,
};

use super::{RepositoryError, ensure_owned, parse_column};
use crate::models::product::{ImageFields, ProductFields};

const PRODUCT_COLUMNS: &str = "p.id, p.store_id, p.category_id, p.name, p.slug, p.description, \
     p.sku, p.price, p.compare_at_price, p.weight_grams, p.inventory_quantity, p.status, \
     p.created_at, p.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    store_id: i32,
    category_id: Option<i32>,
    name: String,
    slug: String,
    description: Option<String>,
    sku: Option<String>,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    weight_grams: Option<i32>,
    inventory_quantity: Option<i32>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(
        self,
        collection_ids: Vec<CollectionId>,
        images: Vec<ProductImage>,
    ) -> Result<Product, RepositoryError> {
        Ok(Product {
            id: ProductId::new(self.id),
            store_id: StoreId::new(self.store_id),
            category_id: self.category_id.map(CategoryId::new),
            name: self.name,
            slug: Slug::parse(&self.slug)
                .map_err(|e| RepositoryError::DataCorruption(format!("product slug: {e}")))?,
            description: self.description,
            sku: self.sku,
            price: self.price,
            compare_at_price: self.compare_at_price,
            weight_grams: self.weight_grams,
            inventory_quantity: self.inventory_quantity,
            status: parse_column(&self.status)?,
            collection_ids,
            images,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: i32,
    product_id: i32,
    url: String,
    alt_text: Option<String>,
    position: i32,
}

impl From<ImageRow> for ProductImage {
    fn from(row: ImageRow) -> Self {
        Self {
            id: ProductImageId::new(row.id),
            product_id: ProductId::new(row.product_id),
            url: row.url,
            alt_text: row.alt_text,
            position: row.position,
        }
    }
}

/// Repository for products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a store's products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        store_id: StoreId,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM commerce.product p
            WHERE p.store_id = $1
              AND ($2::text IS NULL OR p.status = $2)
              AND ($3::int IS NULL OR p.category_id = $3)
              AND ($4::int IS NULL OR EXISTS (
                    SELECT 1 FROM commerce.product_collection pc
                    WHERE pc.product_id = p.id AND pc.collection_id = $4))
              AND ($5::text IS NULL
                   OR p.name ILIKE $5 OR p.sku ILIKE $5 OR p.description ILIKE $5)
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $6 OFFSET $7
            "
        ))
        .bind(store_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.category_id)
        .bind(filter.collection_id)
        .bind(filter.query_pattern())
        .bind(filter.effective_limit())
        .bind(filter.effective_offset())
        .fetch_all(&mut *conn)
        .await?;

        hydrate(&mut conn, rows).await
    }

    /// Get one product of a store, with images and collections.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the store.
    pub async fn get(&self, store_id: StoreId, id: ProductId) -> Result<Product, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_one(&mut conn, store_id, id).await
    }

    /// Create a product and its collection memberships.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` when the category or a collection
    /// is not in the store, or `RepositoryError::Conflict` for a taken slug.
    pub async fn create(
        &self,
        store_id: StoreId,
        fields: &ProductFields,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        check_references(&mut tx, store_id, fields).await?;

        let (id,): (i32,) = sqlx::query_as(
            r"
            INSERT INTO commerce.product (
                store_id, category_id, name, slug, description, sku, price,
                compare_at_price, weight_grams, inventory_quantity, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            ",
        )
        .bind(store_id)
        .bind(fields.category_id)
        .bind(&fields.name)
        .bind(fields.slug.as_str())
        .bind(&fields.description)
        .bind(&fields.sku)
        .bind(fields.price)
        .bind(fields.compare_at_price)
        .bind(fields.weight_grams)
        .bind(fields.inventory_quantity)
        .bind(fields.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product slug"))?;

        let id = ProductId::new(id);
        if let Some(collection_ids) = &fields.collection_ids {
            replace_collections(&mut tx, id, collection_ids).await?;
        }

        let product = fetch_one(&mut tx, store_id, id).await?;
        tx.commit().await?;
        Ok(product)
    }

    /// Replace a product's editable columns (and memberships when given).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update(
        &self,
        store_id: StoreId,
        id: ProductId,
        fields: &ProductFields,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        check_references(&mut tx, store_id, fields).await?;

        let result = sqlx::query(
            r"
            UPDATE commerce.product
            SET category_id = $3, name = $4, slug = $5, description = $6, sku = $7,
                price = $8, compare_at_price = $9, weight_grams = $10,
                inventory_quantity = $11, status = $12, updated_at = NOW()
            WHERE store_id = $1 AND id = $2
            ",
        )
        .bind(store_id)
        .bind(id)
        .bind(fields.category_id)
        .bind(&fields.name)
        .bind(fields.slug.as_str())
        .bind(&fields.description)
        .bind(&fields.sku)
        .bind(fields.price)
        .bind(fields.compare_at_price)
        .bind(fields.weight_grams)
        .bind(fields.inventory_quantity)
        .bind(fields.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "product slug"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        if let Some(collection_ids) = &fields.collection_ids {
            replace_collections(&mut tx, id, collection_ids).await?;
        }

        let product = fetch_one(&mut tx, store_id, id).await?;
        tx.commit().await?;
        Ok(product)
    }

    /// Delete a product. Cart lines, images and memberships go with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the store.
    pub async fn delete(&self, store_id: StoreId, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM commerce.product WHERE store_id = $1 AND id = $2")
            .bind(store_id)
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Attach an image, inserting at `position` or appending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the store.
    pub async fn add_image(
        &self,
        store_id: StoreId,
        id: ProductId,
        image: &ImageFields,
    ) -> Result<Vec<ProductImage>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_product(&mut tx, store_id, id).await?;

        let existing = images_of(&mut tx, id).await?;
        let count = i32::try_from(existing.len()).unwrap_or(i32::MAX);
        let position = image.position.map_or(count, |p| p.min(count));

        // Make room; positions are renumbered below.
        sqlx::query(
            "UPDATE commerce.product_image SET position = position + 1 WHERE product_id = $1 AND position >= $2",
        )
        .bind(id)
        .bind(position)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO commerce.product_image (product_id, url, alt_text, position)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(id)
        .bind(&image.url)
        .bind(&image.alt_text)
        .bind(position)
        .execute(&mut *tx)
        .await?;

        let images = normalize_image_positions(images_of(&mut tx, id).await?);
        write_positions(&mut tx, &images).await?;
        tx.commit().await?;
        Ok(images)
    }

    /// Remove an image and close the gap it leaves.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the image is not on the product.
    pub async fn delete_image(
        &self,
        store_id: StoreId,
        id: ProductId,
        image_id: ProductImageId,
    ) -> Result<Vec<ProductImage>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_product(&mut tx, store_id, id).await?;

        let result =
            sqlx::query("DELETE FROM commerce.product_image WHERE product_id = $1 AND id = $2")
                .bind(id)
                .bind(image_id)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let images = normalize_image_positions(images_of(&mut tx, id).await?);
        write_positions(&mut tx, &images).await?;
        tx.commit().await?;
        Ok(images)
    }

    /// Reorder a product's images. Unlisted images keep their relative order at the end.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product is not in the store
    /// or an id is not one of its images.
    pub async fn reorder_images(
        &self,
        store_id: StoreId,
        id: ProductId,
        order: &[ProductImageId],
    ) -> Result<Vec<ProductImage>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_product(&mut tx, store_id, id).await?;

        let existing = images_of(&mut tx, id).await?;
        if order.iter().any(|wanted| !existing.iter().any(|i| i.id == *wanted)) {
            return Err(RepositoryError::NotFound);
        }

        let images = reorder_images(existing, order);
        write_positions(&mut tx, &images).await?;
        tx.commit().await?;
        Ok(images)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn check_references(
    conn: &mut PgConnection,
    store_id: StoreId,
    fields: &ProductFields,
) -> Result<(), RepositoryError> {
    if let Some(category_id) = fields.category_id {
        ensure_owned(conn, "category", store_id, &[category_id.as_i32()]).await?;
    }
    if let Some(collection_ids) = &fields.collection_ids {
        ensure_owned(conn, "collection", store_id, &raw_ids(collection_ids)).await?;
    }
    Ok(())
}

async fn lock_product(
    conn: &mut PgConnection,
    store_id: StoreId,
    id: ProductId,
) -> Result<(), RepositoryError> {
    let found: Option<(i32,)> =
        sqlx::query_as("SELECT id FROM commerce.product WHERE store_id = $1 AND id = $2 FOR UPDATE")
            .bind(store_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
    found.map(|_| ()).ok_or(RepositoryError::NotFound)
}

async fn replace_collections(
    conn: &mut PgConnection,
    id: ProductId,
    collection_ids: &[CollectionId],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM commerce.product_collection WHERE product_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if !collection_ids.is_empty() {
        sqlx::query(
            r"
            INSERT INTO commerce.product_collection (product_id, collection_id)
            SELECT $1, UNNEST($2::int[])
            ",
        )
        .bind(id)
        .bind(raw_ids(collection_ids))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn images_of(
    conn: &mut PgConnection,
    id: ProductId,
) -> Result<Vec<ProductImage>, RepositoryError> {
    let rows: Vec<ImageRow> = sqlx::query_as(
        r"
        SELECT id, product_id, url, alt_text, position
        FROM commerce.product_image
        WHERE product_id = $1
        ORDER BY position, id
        ",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

async fn write_positions(
    conn: &mut PgConnection,
    images: &[ProductImage],
) -> Result<(), RepositoryError> {
    let ids: Vec<i32> = images.iter().map(|i| i.id.as_i32()).collect();
    let positions: Vec<i32> = images.iter().map(|i| i.position).collect();
    sqlx::query(
        r"
        UPDATE commerce.product_image AS pi
        SET position = v.position
        FROM UNNEST($1::int[], $2::int[]) AS v(id, position)
        WHERE pi.id = v.id
        ",
    )
    .bind(ids)
    .bind(positions)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn fetch_one(
    conn: &mut PgConnection,
    store_id: StoreId,
    id: ProductId,
) -> Result<Product, RepositoryError> {
    let row: Option<ProductRow> = sqlx::query_as(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM commerce.product p WHERE p.store_id = $1 AND p.id = $2"
    ))
    .bind(store_id)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let row = row.ok_or(RepositoryError::NotFound)?;
    hydrate(conn, vec![row])
        .await?
        .pop()
        .ok_or(RepositoryError::NotFound)
}

/// Attach images and collection ids to product rows, keeping row order.
async fn hydrate(
    conn: &mut PgConnection,
    rows: Vec<ProductRow>,
) -> Result<Vec<Product>, RepositoryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();

    let image_rows: Vec<ImageRow> = sqlx::query_as(
        r"
        SELECT id, product_id, url, alt_text, position
        FROM commerce.product_image
        WHERE product_id = ANY($1)
        ORDER BY product_id, position, id
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let memberships: Vec<(i32, i32)> = sqlx::query_as(
        r"
        SELECT product_id, collection_id
        FROM commerce.product_collection
        WHERE product_id = ANY($1)
        ORDER BY product_id, collection_id
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut images: HashMap<i32, Vec<ProductImage>> = HashMap::new();
    for row in image_rows {
        images.entry(row.product_id).or_default().push(row.into());
    }
    let mut collections: HashMap<i32, Vec<CollectionId>> = HashMap::new();
    for (product_id, collection_id) in memberships {
        collections
            .entry(product_id)
            .or_default()
            .push(CollectionId::new(collection_id));
    }

    rows.into_iter()
        .map(|row| {
            let id = row.id;
            row.into_product(
                collections.remove(&id).unwrap_or_default(),
                images.remove(&id).unwrap_or_default(),
            )
        })
        .collect()
}
