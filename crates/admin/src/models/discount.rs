//! Discount payloads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use tillbox_core::pricing::Discount;
use tillbox_core::validation::{self, ValidationError};
use tillbox_core::{CollectionId, ProductId};

use super::{nullable, patch};

/// `POST /api/stores/{store_id}/discounts`
#[derive(Debug, Deserialize)]
pub struct CreateDiscountInput {
    pub name: String,
    pub percentage: Decimal,
    /// Defaults to now.
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_stackable: bool,
    #[serde(default)]
    pub product_ids: Vec<ProductId>,
    #[serde(default)]
    pub collection_ids: Vec<CollectionId>,
}

const fn default_true() -> bool {
    true
}

/// `PATCH /api/stores/{store_id}/discounts/{id}`
///
/// Target lists, when present, replace the stored targets.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateDiscountInput {
    pub name: Option<String>,
    pub percentage: Option<Decimal>,
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub ends_at: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
    pub is_stackable: Option<bool>,
    pub product_ids: Option<Vec<ProductId>>,
    pub collection_ids: Option<Vec<CollectionId>>,
}

/// Validated discount columns and targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountFields {
    pub name: String,
    pub percentage: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_stackable: bool,
    pub product_ids: Vec<ProductId>,
    pub collection_ids: Vec<CollectionId>,
}

impl DiscountFields {
    fn check(mut self) -> Result<Self, ValidationError> {
        self.name = validation::name("name", &self.name)?;
        self.percentage = validation::percentage("percentage", self.percentage)?;
        if self.percentage.normalize().scale() > 2 {
            return Err(ValidationError::TooPrecise {
                field: "percentage",
            });
        }
        validation::time_window(self.starts_at, self.ends_at)?;

        self.product_ids.sort_unstable();
        self.product_ids.dedup();
        self.collection_ids.sort_unstable();
        self.collection_ids.dedup();
        if self.product_ids.is_empty() && self.collection_ids.is_empty() {
            return Err(ValidationError::Required {
                field: "product_ids or collection_ids",
            });
        }
        Ok(self)
    }
}

impl CreateDiscountInput {
    /// Validate into storable fields, starting the window at `now` if unset.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(self, now: DateTime<Utc>) -> Result<DiscountFields, ValidationError> {
        DiscountFields {
            name: self.name,
            percentage: self.percentage,
            starts_at: self.starts_at.unwrap_or(now),
            ends_at: self.ends_at,
            is_active: self.is_active,
            is_stackable: self.is_stackable,
            product_ids: self.product_ids,
            collection_ids: self.collection_ids,
        }
        .check()
    }
}

impl UpdateDiscountInput {
    /// Merge onto the stored discount and validate.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn apply(self, current: &Discount) -> Result<DiscountFields, ValidationError> {
        DiscountFields {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            percentage: self.percentage.unwrap_or(current.percentage),
            starts_at: self.starts_at.unwrap_or(current.starts_at),
            ends_at: patch(self.ends_at, current.ends_at),
            is_active: self.is_active.unwrap_or(current.is_active),
            is_stackable: self.is_stackable.unwrap_or(current.is_stackable),
            product_ids: self
                .product_ids
                .unwrap_or_else(|| current.product_ids.clone()),
            collection_ids: self
                .collection_ids
                .unwrap_or_else(|| current.collection_ids.clone()),
        }
        .check()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create(json: &str) -> Result<DiscountFields, ValidationError> {
        serde_json::from_str::<CreateDiscountInput>(json)
            .unwrap()
            .validate(Utc::now())
    }

    #[test]
    fn test_defaults() {
        let fields = create(r#"{"name":"Spring","percentage":"20","product_ids":[2,1,2]}"#).unwrap();
        assert!(fields.is_active);
        assert!(!fields.is_stackable);
        assert_eq!(fields.product_ids, vec![ProductId::new(1), ProductId::new(2)]);
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(create(r#"{"name":"A","percentage":"0","product_ids":[1]}"#).is_err());
        assert!(create(r#"{"name":"A","percentage":"100","product_ids":[1]}"#).is_ok());
        assert!(create(r#"{"name":"A","percentage":"100.5","product_ids":[1]}"#).is_err());
        assert!(create(r#"{"name":"A","percentage":"12.345","product_ids":[1]}"#).is_err());
    }

    #[test]
    fn test_requires_a_target() {
        assert!(matches!(
            create(r#"{"name":"A","percentage":"10"}"#),
            Err(ValidationError::Required { .. })
        ));
        assert!(create(r#"{"name":"A","percentage":"10","collection_ids":[4]}"#).is_ok());
    }

    #[test]
    fn test_window_order() {
        let now = Utc::now();
        let input = CreateDiscountInput {
            name: "Late".to_owned(),
            percentage: Decimal::TEN,
            starts_at: Some(now),
            ends_at: Some(now - Duration::hours(1)),
            is_active: true,
            is_stackable: false,
            product_ids: vec![ProductId::new(1)],
            collection_ids: vec![],
        };
        assert!(matches!(
            input.validate(now),
            Err(ValidationError::InvertedRange { .. })
        ));
    }
}
