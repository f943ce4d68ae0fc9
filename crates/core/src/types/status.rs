//! Status enums for catalog, pricing and shipping entities.
//!
//! These are stored as lowercase `TEXT` columns guarded by `CHECK`
//! constraints, so each enum round-trips through `Display`/`FromStr`.

use serde::{Deserialize, Serialize};

/// Product publication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    /// Not visible on the storefront.
    #[default]
    Draft,
    /// Visible and purchasable.
    Active,
    /// Retired; hidden from the storefront and removed from carts.
    Archived,
}

impl ProductStatus {
    /// Column value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            _ => Err(format!("invalid product status: {s}")),
        }
    }
}

/// How a shipping rate is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingRateType {
    /// Fixed price regardless of cart contents.
    Flat,
    /// Applies within a weight band; optional per-kilogram surcharge.
    WeightBased,
    /// Applies within a subtotal band.
    PriceBased,
    /// Zero price, optionally above a subtotal threshold.
    Free,
}

impl ShippingRateType {
    /// Column value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::WeightBased => "weight_based",
            Self::PriceBased => "price_based",
            Self::Free => "free",
        }
    }
}

impl std::fmt::Display for ShippingRateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShippingRateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat" => Ok(Self::Flat),
            "weight_based" => Ok(Self::WeightBased),
            "price_based" => Ok(Self::PriceBased),
            "free" => Ok(Self::Free),
            _ => Err(format!("invalid shipping rate type: {s}")),
        }
    }
}

/// Where a discount sits relative to its time window.
///
/// Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountState {
    /// Window has not opened yet.
    Scheduled,
    /// Currently applied to matching products.
    Active,
    /// Window has closed.
    Expired,
    /// Switched off by the store owner.
    Disabled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_product_status_roundtrip() {
        for status in [
            ProductStatus::Draft,
            ProductStatus::Active,
            ProductStatus::Archived,
        ] {
            assert_eq!(ProductStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(ProductStatus::from_str("deleted").is_err());
    }

    #[test]
    fn test_rate_type_serde_matches_column_value() {
        let json = serde_json::to_string(&ShippingRateType::WeightBased).unwrap();
        assert_eq!(json, "\"weight_based\"");
        assert_eq!(
            ShippingRateType::from_str("price_based").unwrap(),
            ShippingRateType::PriceBased
        );
    }
}
