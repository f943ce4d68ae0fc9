//! Shipping method, zone and rate payloads.

use rust_decimal::Decimal;
use serde::Deserialize;

use tillbox_core::shipping::{ShippingMethod, ShippingRate, ZoneRegion};
use tillbox_core::validation::{self, ValidationError};
use tillbox_core::{ShippingMethodId, ShippingRateId, ShippingRateType, ShippingZoneId};

use super::{nullable, patch};

// =============================================================================
// Methods
// =============================================================================

/// `POST /api/stores/{store_id}/shipping/methods`
#[derive(Debug, Deserialize)]
pub struct CreateMethodInput {
    pub name: String,
    pub carrier: Option<String>,
    pub min_delivery_days: Option<i32>,
    pub max_delivery_days: Option<i32>,
}

/// `PATCH /api/stores/{store_id}/shipping/methods/{id}`
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMethodInput {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub carrier: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub min_delivery_days: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub max_delivery_days: Option<Option<i32>>,
}

/// Validated method columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodFields {
    pub name: String,
    pub carrier: Option<String>,
    pub min_delivery_days: Option<i32>,
    pub max_delivery_days: Option<i32>,
}

impl MethodFields {
    fn check(self) -> Result<Self, ValidationError> {
        validation::non_negative("min_delivery_days", self.min_delivery_days)?;
        validation::non_negative("max_delivery_days", self.max_delivery_days)?;
        if let (Some(min), Some(max)) = (self.min_delivery_days, self.max_delivery_days)
            && min > max
        {
            return Err(ValidationError::InvertedRange {
                min_field: "min_delivery_days",
                max_field: "max_delivery_days",
            });
        }
        Ok(Self {
            name: validation::name("name", &self.name)?,
            carrier: validation::optional_text(self.carrier.as_deref()),
            ..self
        })
    }
}

impl CreateMethodInput {
    /// Validate into storable fields.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(self) -> Result<MethodFields, ValidationError> {
        MethodFields {
            name: self.name,
            carrier: self.carrier,
            min_delivery_days: self.min_delivery_days,
            max_delivery_days: self.max_delivery_days,
        }
        .check()
    }
}

impl UpdateMethodInput {
    /// Merge onto the stored method and validate.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn apply(self, current: &ShippingMethod) -> Result<MethodFields, ValidationError> {
        MethodFields {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            carrier: patch(self.carrier, current.carrier.clone()),
            min_delivery_days: patch(self.min_delivery_days, current.min_delivery_days),
            max_delivery_days: patch(self.max_delivery_days, current.max_delivery_days),
        }
        .check()
    }
}

// =============================================================================
// Zones
// =============================================================================

/// `POST /api/stores/{store_id}/shipping/zones`
#[derive(Debug, Deserialize)]
pub struct CreateZoneInput {
    pub name: String,
    #[serde(default)]
    pub regions: Vec<ZoneRegion>,
}

/// `PATCH /api/stores/{store_id}/shipping/zones/{id}`
///
/// `regions`, when present, replaces the zone's regions.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateZoneInput {
    pub name: Option<String>,
    pub regions: Option<Vec<ZoneRegion>>,
}

/// Validated zone columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneFields {
    pub name: String,
    /// `None` leaves regions untouched.
    pub regions: Option<Vec<ZoneRegion>>,
}

fn check_regions(regions: Vec<ZoneRegion>) -> Result<Vec<ZoneRegion>, ValidationError> {
    let mut checked: Vec<ZoneRegion> = Vec::with_capacity(regions.len());
    for region in regions {
        let region = region.validate()?;
        if !checked.contains(&region) {
            checked.push(region);
        }
    }
    Ok(checked)
}

impl CreateZoneInput {
    /// Validate into storable fields.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(self) -> Result<ZoneFields, ValidationError> {
        Ok(ZoneFields {
            name: validation::name("name", &self.name)?,
            regions: Some(check_regions(self.regions)?),
        })
    }
}

impl UpdateZoneInput {
    /// Merge onto the stored zone name and validate.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn apply(self, current_name: &str) -> Result<ZoneFields, ValidationError> {
        Ok(ZoneFields {
            name: validation::name("name", self.name.as_deref().unwrap_or(current_name))?,
            regions: self.regions.map(check_regions).transpose()?,
        })
    }
}

// =============================================================================
// Rates
// =============================================================================

/// `POST /api/stores/{store_id}/shipping/zones/{zone_id}/rates`
#[derive(Debug, Deserialize)]
pub struct CreateRateInput {
    pub method_id: Option<ShippingMethodId>,
    pub name: String,
    pub rate_type: ShippingRateType,
    #[serde(default)]
    pub amount: Decimal,
    pub per_kg_amount: Option<Decimal>,
    pub min_weight_grams: Option<i32>,
    pub max_weight_grams: Option<i32>,
    pub min_subtotal: Option<Decimal>,
    pub max_subtotal: Option<Decimal>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

/// `PATCH /api/stores/{store_id}/shipping/rates/{id}`
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRateInput {
    #[serde(default, deserialize_with = "nullable")]
    pub method_id: Option<Option<ShippingMethodId>>,
    pub name: Option<String>,
    pub rate_type: Option<ShippingRateType>,
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "nullable")]
    pub per_kg_amount: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "nullable")]
    pub min_weight_grams: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub max_weight_grams: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub min_subtotal: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "nullable")]
    pub max_subtotal: Option<Option<Decimal>>,
    pub is_active: Option<bool>,
}

impl CreateRateInput {
    /// Validate into an unsaved rate of `zone_id`.
    ///
    /// The returned rate's `id` is unassigned until inserted.
    ///
    /// # Errors
    ///
    /// Returns the first violated rate rule.
    pub fn validate(self, zone_id: ShippingZoneId) -> Result<ShippingRate, ValidationError> {
        ShippingRate {
            id: ShippingRateId::new(0),
            zone_id,
            method_id: self.method_id,
            name: self.name,
            rate_type: self.rate_type,
            amount: self.amount,
            per_kg_amount: self.per_kg_amount,
            min_weight_grams: self.min_weight_grams,
            max_weight_grams: self.max_weight_grams,
            min_subtotal: self.min_subtotal,
            max_subtotal: self.max_subtotal,
            is_active: self.is_active,
        }
        .validate()
    }
}

impl UpdateRateInput {
    /// Merge onto the stored rate and validate.
    ///
    /// # Errors
    ///
    /// Returns the first violated rate rule.
    pub fn apply(self, current: &ShippingRate) -> Result<ShippingRate, ValidationError> {
        ShippingRate {
            id: current.id,
            zone_id: current.zone_id,
            method_id: patch(self.method_id, current.method_id),
            name: self.name.unwrap_or_else(|| current.name.clone()),
            rate_type: self.rate_type.unwrap_or(current.rate_type),
            amount: self.amount.unwrap_or(current.amount),
            per_kg_amount: patch(self.per_kg_amount, current.per_kg_amount),
            min_weight_grams: patch(self.min_weight_grams, current.min_weight_grams),
            max_weight_grams: patch(self.max_weight_grams, current.max_weight_grams),
            min_subtotal: patch(self.min_subtotal, current.min_subtotal),
            max_subtotal: patch(self.max_subtotal, current.max_subtotal),
            is_active: self.is_active.unwrap_or(current.is_active),
        }
        .validate()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_method_day_range() {
        let input = CreateMethodInput {
            name: "Ground".to_owned(),
            carrier: Some(" ".to_owned()),
            min_delivery_days: Some(5),
            max_delivery_days: Some(3),
        };
        assert!(input.validate().is_err());

        let ok = CreateMethodInput {
            name: "Ground".to_owned(),
            carrier: Some(" ".to_owned()),
            min_delivery_days: Some(3),
            max_delivery_days: Some(5),
        }
        .validate()
        .unwrap();
        assert_eq!(ok.carrier, None);
    }

    #[test]
    fn test_zone_regions_normalized_and_deduplicated() {
        let input: CreateZoneInput = serde_json::from_str(
            r#"{"name":"North America","regions":[
                {"country_code":"us"},
                {"country_code":"US"},
                {"country_code":"ca","province_code":"qc"}
            ]}"#,
        )
        .unwrap();
        let fields = input.validate().unwrap();
        let regions = fields.regions.unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1].province_code.as_deref(), Some("QC"));
    }

    #[test]
    fn test_rate_update_revalidates_merged_rate() {
        let current = CreateRateInput {
            method_id: None,
            name: "Free over 50".to_owned(),
            rate_type: ShippingRateType::Free,
            amount: Decimal::ZERO,
            per_kg_amount: None,
            min_weight_grams: None,
            max_weight_grams: None,
            min_subtotal: Some(Decimal::from(50)),
            max_subtotal: None,
            is_active: true,
        }
        .validate(ShippingZoneId::new(1))
        .unwrap();

        let priced: UpdateRateInput = serde_json::from_str(r#"{"amount":"4.00"}"#).unwrap();
        assert!(priced.apply(&current).is_err());

        let flat: UpdateRateInput =
            serde_json::from_str(r#"{"rate_type":"flat","amount":"4.00","min_subtotal":null}"#)
                .unwrap();
        let rate = flat.apply(&current).unwrap();
        assert_eq!(rate.rate_type, ShippingRateType::Flat);
        assert_eq!(rate.min_subtotal, None);
    }
}
