//! Catalog entities shared by the admin and storefront services.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{
    CategoryId, CollectionId, CurrencyCode, ProductId, ProductImageId, ProductStatus, Slug,
    StoreId,
};

/// A tenant: every other entity belongs to exactly one store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub slug: Slug,
    pub currency: CurrencyCode,
    pub contact_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product category. Categories form a forest via `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub store_id: StoreId,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A curated, many-to-many grouping of products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub store_id: StoreId,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sellable product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    /// Shipping weight in grams. `None` ships as weightless.
    pub weight_grams: Option<i32>,
    /// Units on hand. `None` means stock is not tracked.
    pub inventory_quantity: Option<i32>,
    pub status: ProductStatus,
    /// Collections this product belongs to.
    pub collection_ids: Vec<CollectionId>,
    pub images: Vec<ProductImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether shoppers can see and buy the product.
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Shipping weight, treating an unset weight as zero.
    #[must_use]
    pub fn shipping_weight_grams(&self) -> i64 {
        i64::from(self.weight_grams.unwrap_or(0).max(0))
    }
}

/// An image attached to a product, referenced by URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductImage {
    pub id: ProductImageId,
    pub product_id: ProductId,
    pub url: String,
    pub alt_text: Option<String>,
    /// 0-based display order.
    pub position: i32,
}

/// Listing filter shared by admin and storefront product queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Only products with this status (the storefront forces `active`).
    pub status: Option<ProductStatus>,
    pub category_id: Option<CategoryId>,
    pub collection_id: Option<CollectionId>,
    /// Case-insensitive match on name, SKU or description.
    pub query: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ProductFilter {
    /// Default page size.
    pub const DEFAULT_LIMIT: i64 = 50;
    /// Largest page a caller may request.
    pub const MAX_LIMIT: i64 = 200;

    /// Page size clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    /// Offset, never negative.
    #[must_use]
    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    /// `ILIKE` pattern for the text query, with wildcards escaped.
    #[must_use]
    pub fn query_pattern(&self) -> Option<String> {
        let query = self.query.as_deref()?.trim();
        if query.is_empty() {
            return None;
        }
        let escaped = query
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        Some(format!("%{escaped}%"))
    }
}

/// Whether making `new_parent` the parent of `category` would form a cycle.
///
/// `parents` maps every category of the store to its current parent.
#[must_use]
pub fn would_create_cycle(
    parents: &HashMap<CategoryId, Option<CategoryId>>,
    category: CategoryId,
    new_parent: Option<CategoryId>,
) -> bool {
    let mut cursor = new_parent;
    let mut steps = 0usize;

    while let Some(current) = cursor {
        if current == category {
            return true;
        }
        steps += 1;
        // Corrupt data with an existing loop must not hang the request.
        if steps > parents.len() {
            return true;
        }
        cursor = parents.get(&current).copied().flatten();
    }

    false
}

/// Reorder images to match `order` and renumber positions densely from 0.
///
/// Images missing from `order` keep their relative order after the listed ones.
#[must_use]
pub fn reorder_images(mut images: Vec<ProductImage>, order: &[ProductImageId]) -> Vec<ProductImage> {
    let rank: HashMap<ProductImageId, usize> =
        order.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    images.sort_by_key(|image| {
        (
            rank.get(&image.id).copied().unwrap_or(usize::MAX),
            image.position,
            image.id,
        )
    });

    normalize_image_positions(images)
}

/// Renumber positions densely from 0, preserving current order.
#[must_use]
pub fn normalize_image_positions(mut images: Vec<ProductImage>) -> Vec<ProductImage> {
    images.sort_by_key(|image| (image.position, image.id));
    for (position, image) in (0_i32..).zip(images.iter_mut()) {
        image.position = position;
    }
    images
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: i32, position: i32) -> ProductImage {
        ProductImage {
            id: ProductImageId::new(id),
            product_id: ProductId::new(1),
            url: format!("https://cdn.test/{id}.jpg"),
            alt_text: None,
            position,
        }
    }

    #[test]
    fn test_cycle_detection() {
        let a = CategoryId::new(1);
        let b = CategoryId::new(2);
        let c = CategoryId::new(3);
        // c -> b -> a
        let parents = HashMap::from([(a, None), (b, Some(a)), (c, Some(b))]);

        assert!(would_create_cycle(&parents, a, Some(c)));
        assert!(would_create_cycle(&parents, a, Some(a)));
        assert!(!would_create_cycle(&parents, c, Some(a)));
        assert!(!would_create_cycle(&parents, a, None));
    }

    #[test]
    fn test_cycle_detection_terminates_on_corrupt_data() {
        let a = CategoryId::new(1);
        let b = CategoryId::new(2);
        let x = CategoryId::new(9);
        let parents = HashMap::from([(a, Some(b)), (b, Some(a)), (x, None)]);
        assert!(would_create_cycle(&parents, x, Some(a)));
    }

    #[test]
    fn test_normalize_positions() {
        let images = normalize_image_positions(vec![image(1, 5), image(2, 2), image(3, 9)]);
        let ids: Vec<i32> = images.iter().map(|i| i.id.as_i32()).collect();
        let positions: Vec<i32> = images.iter().map(|i| i.position).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_reorder_images_puts_unlisted_last() {
        let images = vec![image(1, 0), image(2, 1), image(3, 2)];
        let reordered = reorder_images(images, &[ProductImageId::new(3), ProductImageId::new(1)]);
        let ids: Vec<i32> = reordered.iter().map(|i| i.id.as_i32()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(reordered[2].position, 2);
    }

    #[test]
    fn test_filter_limits_and_pattern() {
        let filter = ProductFilter {
            limit: Some(10_000),
            offset: Some(-3),
            query: Some(" 50%_off ".to_owned()),
            ..ProductFilter::default()
        };
        assert_eq!(filter.effective_limit(), ProductFilter::MAX_LIMIT);
        assert_eq!(filter.effective_offset(), 0);
        assert_eq!(filter.query_pattern().as_deref(), Some("%50\\%\\_off%"));
        assert_eq!(ProductFilter::default().query_pattern(), None);
    }
}
