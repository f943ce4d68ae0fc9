//! Product and product image payloads.

use rust_decimal::Decimal;
use serde::Deserialize;

use tillbox_core::catalog::Product;
use tillbox_core::validation::{self, ValidationError};
use tillbox_core::{CategoryId, CollectionId, ProductImageId, ProductStatus, Slug};

use super::{nullable, parse_slug, patch, slug_or_derived};

/// `POST /api/stores/{store_id}/products`
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub weight_grams: Option<i32>,
    pub inventory_quantity: Option<i32>,
    #[serde(default)]
    pub status: ProductStatus,
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub collection_ids: Vec<CollectionId>,
}

/// `PATCH /api/stores/{store_id}/products/{id}`
///
/// `collection_ids`, when present, replaces the product's memberships.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub sku: Option<Option<String>>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "nullable")]
    pub compare_at_price: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "nullable")]
    pub weight_grams: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub inventory_quantity: Option<Option<i32>>,
    pub status: Option<ProductStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<CategoryId>>,
    pub collection_ids: Option<Vec<CollectionId>>,
}

/// Validated product columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFields {
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub weight_grams: Option<i32>,
    pub inventory_quantity: Option<i32>,
    pub status: ProductStatus,
    pub category_id: Option<CategoryId>,
    /// `None` leaves memberships untouched.
    pub collection_ids: Option<Vec<CollectionId>>,
}

impl ProductFields {
    fn check(mut self) -> Result<Self, ValidationError> {
        self.price = validation::money("price", self.price)?;
        if let Some(compare_at) = self.compare_at_price {
            validation::money("compare_at_price", compare_at)?;
            if compare_at <= self.price {
                return Err(ValidationError::invalid(
                    "compare_at_price",
                    "must be greater than price",
                ));
            }
        }
        validation::non_negative("weight_grams", self.weight_grams)?;
        validation::non_negative("inventory_quantity", self.inventory_quantity)?;
        if let Some(ids) = self.collection_ids.as_mut() {
            ids.sort_unstable();
            ids.dedup();
        }
        Ok(self)
    }
}

impl CreateProductInput {
    /// Validate into storable fields.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(self) -> Result<ProductFields, ValidationError> {
        let name = validation::name("name", &self.name)?;
        ProductFields {
            slug: slug_or_derived(self.slug.as_deref(), &name)?,
            name,
            description: validation::optional_text(self.description.as_deref()),
            sku: validation::optional_text(self.sku.as_deref()),
            price: self.price,
            compare_at_price: self.compare_at_price,
            weight_grams: self.weight_grams,
            inventory_quantity: self.inventory_quantity,
            status: self.status,
            category_id: self.category_id,
            collection_ids: Some(self.collection_ids),
        }
        .check()
    }
}

impl UpdateProductInput {
    /// Merge onto the stored product and validate.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn apply(self, current: &Product) -> Result<ProductFields, ValidationError> {
        let name = match self.name {
            Some(n) => validation::name("name", &n)?,
            None => current.name.clone(),
        };
        let slug = match self.slug {
            Some(s) => parse_slug(&s)?,
            None => current.slug.clone(),
        };
        let description = patch(self.description, current.description.clone());
        let sku = patch(self.sku, current.sku.clone());

        ProductFields {
            name,
            slug,
            description: validation::optional_text(description.as_deref()),
            sku: validation::optional_text(sku.as_deref()),
            price: self.price.unwrap_or(current.price),
            compare_at_price: patch(self.compare_at_price, current.compare_at_price),
            weight_grams: patch(self.weight_grams, current.weight_grams),
            inventory_quantity: patch(self.inventory_quantity, current.inventory_quantity),
            status: self.status.unwrap_or(current.status),
            category_id: patch(self.category_id, current.category_id),
            collection_ids: self.collection_ids,
        }
        .check()
    }
}

/// `POST /api/stores/{store_id}/products/{id}/images`
#[derive(Debug, Deserialize)]
pub struct AddImageInput {
    pub url: String,
    pub alt_text: Option<String>,
    /// Insert before the image currently at this position; appends when absent.
    pub position: Option<i32>,
}

/// Validated image columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFields {
    pub url: String,
    pub alt_text: Option<String>,
    pub position: Option<i32>,
}

impl AddImageInput {
    /// Validate into storable fields.
    ///
    /// # Errors
    ///
    /// Returns an error for a non-http(s) URL or a negative position.
    pub fn validate(self) -> Result<ImageFields, ValidationError> {
        Ok(ImageFields {
            url: validation::image_url(&self.url)?,
            alt_text: validation::optional_text(self.alt_text.as_deref()),
            position: validation::non_negative("position", self.position)?,
        })
    }
}

/// `PUT /api/stores/{store_id}/products/{id}/images/order`
#[derive(Debug, Deserialize)]
pub struct ReorderImagesInput {
    pub image_ids: Vec<ProductImageId>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn create(json: &str) -> Result<ProductFields, ValidationError> {
        serde_json::from_str::<CreateProductInput>(json).unwrap().validate()
    }

    #[test]
    fn test_create_defaults() {
        let fields = create(r#"{"name":"Linen Shirt","price":"49.00"}"#).unwrap();
        assert_eq!(fields.slug.as_str(), "linen-shirt");
        assert_eq!(fields.status, ProductStatus::Draft);
        assert_eq!(fields.collection_ids, Some(vec![]));
    }

    #[test]
    fn test_compare_at_must_exceed_price() {
        assert!(create(r#"{"name":"A","price":"10.00","compare_at_price":"10.00"}"#).is_err());
        assert!(create(r#"{"name":"A","price":"10.00","compare_at_price":"12.00"}"#).is_ok());
    }

    #[test]
    fn test_rejects_negative_and_sub_cent_values() {
        assert!(create(r#"{"name":"A","price":"-1"}"#).is_err());
        assert!(create(r#"{"name":"A","price":"1.001"}"#).is_err());
        assert!(create(r#"{"name":"A","price":"1","weight_grams":-5}"#).is_err());
    }

    #[test]
    fn test_collection_ids_deduplicated() {
        let fields = create(r#"{"name":"A","price":"1","collection_ids":[3,1,3]}"#).unwrap();
        assert_eq!(
            fields.collection_ids,
            Some(vec![CollectionId::new(1), CollectionId::new(3)])
        );
    }

    #[test]
    fn test_image_url_validated() {
        let ok = AddImageInput {
            url: "https://cdn.shop.test/a.jpg".to_owned(),
            alt_text: Some(" ".to_owned()),
            position: None,
        }
        .validate()
        .unwrap();
        assert_eq!(ok.alt_text, None);

        let bad = AddImageInput {
            url: "javascript:alert(1)".to_owned(),
            alt_text: None,
            position: None,
        };
        assert!(bad.validate().is_err());
    }
}
