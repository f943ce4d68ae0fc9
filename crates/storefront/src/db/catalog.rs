//! Catalog and discount reads. Only what shoppers may see is returned.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use tillbox_core::catalog::{Category, Collection, Product, ProductFilter, ProductImage, Store};
use tillbox_core::pricing::Discount;
use tillbox_core::{
    CategoryId, CollectionId, DiscountId, ProductId, ProductImageId, ProductStatus, Slug, StoreId,
};

use super::{RepositoryError, parse_column};

const PRODUCT_COLUMNS: &str = "p.id, p.store_id, p.category_id, p.name, p.slug, p.description, \
     p.sku, p.price, p.compare_at_price, p.weight_grams, p.inventory_quantity, p.status, \
     p.created_at, p.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: i32,
    name: String,
    slug: String,
    currency: String,
    contact_email: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

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

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: i32,
    product_id: i32,
    url: String,
    alt_text: Option<String>,
    position: i32,
}

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

fn stored_slug(raw: &str) -> Result<Slug, RepositoryError> {
    Slug::parse(raw).map_err(|e| RepositoryError::DataCorruption(format!("slug '{raw}': {e}")))
}

impl TryFrom<StoreRow> for Store {
    type Error = RepositoryError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: StoreId::new(row.id),
            name: row.name,
            slug: stored_slug(&row.slug)?,
            currency: parse_column(&row.currency)?,
            contact_email: row.contact_email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<CategoryRow> for Category {
    type Error = RepositoryError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CategoryId::new(row.id),
            store_id: StoreId::new(row.store_id),
            name: row.name,
            slug: stored_slug(&row.slug)?,
            description: row.description,
            parent_id: row.parent_id.map(CategoryId::new),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<CollectionRow> for Collection {
    type Error = RepositoryError;

    fn try_from(row: CollectionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CollectionId::new(row.id),
            store_id: StoreId::new(row.store_id),
            name: row.name,
            slug: stored_slug(&row.slug)?,
            description: row.description,
            is_published: row.is_published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Catalog reads for one request.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a store by its public slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn store_by_slug(&self, slug: &Slug) -> Result<Option<Store>, RepositoryError> {
        let row: Option<StoreRow> = sqlx::query_as(
            r"
            SELECT id, name, slug, currency, contact_email, created_at, updated_at
            FROM commerce.store
            WHERE slug = $1
            ",
        )
        .bind(slug.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// All categories of a store, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn categories(&self, store_id: StoreId) -> Result<Vec<Category>, RepositoryError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            r"
            SELECT id, store_id, name, slug, description, parent_id, created_at, updated_at
            FROM commerce.category
            WHERE store_id = $1
            ORDER BY name, id
            ",
        )
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Find a category by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn category_by_slug(
        &self,
        store_id: StoreId,
        slug: &Slug,
    ) -> Result<Option<Category>, RepositoryError> {
        let row: Option<CategoryRow> = sqlx::query_as(
            r"
            SELECT id, store_id, name, slug, description, parent_id, created_at, updated_at
            FROM commerce.category
            WHERE store_id = $1 AND slug = $2
            ",
        )
        .bind(store_id)
        .bind(slug.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Published collections of a store, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn published_collections(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<Collection>, RepositoryError> {
        let rows: Vec<CollectionRow> = sqlx::query_as(
            r"
            SELECT id, store_id, name, slug, description, is_published, created_at, updated_at
            FROM commerce.collection
            WHERE store_id = $1 AND is_published
            ORDER BY name, id
            ",
        )
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Find a published collection by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn published_collection_by_slug(
        &self,
        store_id: StoreId,
        slug: &Slug,
    ) -> Result<Option<Collection>, RepositoryError> {
        let row: Option<CollectionRow> = sqlx::query_as(
            r"
            SELECT id, store_id, name, slug, description, is_published, created_at, updated_at
            FROM commerce.collection
            WHERE store_id = $1 AND slug = $2 AND is_published
            ",
        )
        .bind(store_id)
        .bind(slug.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Active products matching `filter`, newest first. The status filter is
    /// always forced to `active`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn active_products(
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
              AND p.status = $2
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
        .bind(ProductStatus::Active.as_str())
        .bind(filter.category_id)
        .bind(filter.collection_id)
        .bind(filter.query_pattern())
        .bind(filter.effective_limit())
        .bind(filter.effective_offset())
        .fetch_all(&mut *conn)
        .await?;

        hydrate(&mut conn, rows).await
    }

    /// An active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn active_product_by_slug(
        &self,
        store_id: StoreId,
        slug: &Slug,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM commerce.product p
            WHERE p.store_id = $1 AND p.slug = $2 AND p.status = $3
            "
        ))
        .bind(store_id)
        .bind(slug.as_str())
        .bind(ProductStatus::Active.as_str())
        .fetch_all(&mut *conn)
        .await?;

        Ok(hydrate(&mut conn, rows).await?.pop())
    }

    /// Products by id regardless of status, for pricing cart lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn products_by_ids(
        &self,
        store_id: StoreId,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i32> = ids.iter().map(|id| id.as_i32()).collect();

        let mut conn = self.pool.acquire().await?;
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM commerce.product p
            WHERE p.store_id = $1 AND p.id = ANY($2)
            "
        ))
        .bind(store_id)
        .bind(&raw)
        .fetch_all(&mut *conn)
        .await?;

        hydrate(&mut conn, rows).await
    }

    /// Discounts that are switched on and not yet over, with their targets.
    ///
    /// Discounts that start later are included; pricing checks the window.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn current_discounts(&self, store_id: StoreId) -> Result<Vec<Discount>, RepositoryError> {
        let rows: Vec<DiscountRow> = sqlx::query_as(
            r"
            SELECT id, store_id, name, percentage, starts_at, ends_at, is_active,
                   is_stackable, created_at, updated_at
            FROM commerce.discount
            WHERE store_id = $1 AND is_active AND (ends_at IS NULL OR ends_at > NOW())
            ORDER BY id
            ",
        )
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let product_targets: Vec<(i32, i32)> = sqlx::query_as(
            "SELECT discount_id, product_id FROM commerce.discount_product WHERE discount_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;
        let collection_targets: Vec<(i32, i32)> = sqlx::query_as(
            "SELECT discount_id, collection_id FROM commerce.discount_collection WHERE discount_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut products: HashMap<i32, Vec<ProductId>> = HashMap::new();
        for (discount_id, product_id) in product_targets {
            products.entry(discount_id).or_default().push(ProductId::new(product_id));
        }
        let mut collections: HashMap<i32, Vec<CollectionId>> = HashMap::new();
        for (discount_id, collection_id) in collection_targets {
            collections
                .entry(discount_id)
                .or_default()
                .push(CollectionId::new(collection_id));
        }

        Ok(rows
            .into_iter()
            .map(|row| Discount {
                id: DiscountId::new(row.id),
                store_id: StoreId::new(row.store_id),
                name: row.name,
                percentage: row.percentage,
                starts_at: row.starts_at,
                ends_at: row.ends_at,
                is_active: row.is_active,
                is_stackable: row.is_stackable,
                product_ids: products.remove(&row.id).unwrap_or_default(),
                collection_ids: collections.remove(&row.id).unwrap_or_default(),
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
            .collect())
    }
}

/// Attach images and collection memberships, keeping row order.
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
        "SELECT product_id, collection_id FROM commerce.product_collection WHERE product_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut images: HashMap<i32, Vec<ProductImage>> = HashMap::new();
    for row in image_rows {
        images.entry(row.product_id).or_default().push(ProductImage {
            id: ProductImageId::new(row.id),
            product_id: ProductId::new(row.product_id),
            url: row.url,
            alt_text: row.alt_text,
            position: row.position,
        });
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
            Ok(Product {
                id: ProductId::new(row.id),
                store_id: StoreId::new(row.store_id),
                category_id: row.category_id.map(CategoryId::new),
                slug: stored_slug(&row.slug)?,
                name: row.name,
                description: row.description,
                sku: row.sku,
                price: row.price,
                compare_at_price: row.compare_at_price,
                weight_grams: row.weight_grams,
                inventory_quantity: row.inventory_quantity,
                status: parse_column(&row.status)?,
                collection_ids: collections.remove(&row.id).unwrap_or_default(),
                images: images.remove(&row.id).unwrap_or_default(),
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
        })
        .collect()
}
