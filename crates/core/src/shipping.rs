//! Shipping zones, rates and quotes.
//!
//! A store divides the world into zones. Each zone lists regions (a country,
//! optionally narrowed to a province, or the `*` wildcard) and owns a set of
//! rates. A cart is quoted by picking the single most specific zone for its
//! destination and pricing every rate of that zone against the cart's
//! discounted subtotal and weight.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    ShippingAddress, ShippingMethodId, ShippingRateId, ShippingRateType, ShippingZoneId, StoreId,
    round_money,
};
use crate::validation::{self, ValidationError};

/// Country value that matches any destination.
pub const WILDCARD_COUNTRY: &str = "*";

/// Grams per kilogram, for per-kg surcharges.
const GRAMS_PER_KG: i64 = 1000;

/// Errors from shipping selection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShippingError {
    #[error("shipping rate {0} is not available for this cart")]
    RateUnavailable(ShippingRateId),

    #[error("no shipping zone covers {0}")]
    NoZone(String),
}

/// A carrier service a rate can be sold as.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingMethod {
    pub id: ShippingMethodId,
    pub store_id: StoreId,
    pub name: String,
    pub carrier: Option<String>,
    pub min_delivery_days: Option<i32>,
    pub max_delivery_days: Option<i32>,
}

impl ShippingMethod {
    /// Human readable delivery estimate.
    #[must_use]
    pub fn delivery_estimate(&self) -> Option<String> {
        match (self.min_delivery_days, self.max_delivery_days) {
            (Some(min), Some(max)) if min == max => Some(format!("{min} business days")),
            (Some(min), Some(max)) => Some(format!("{min}-{max} business days")),
            (Some(min), None) => Some(format!("{min}+ business days")),
            (None, Some(max)) => Some(format!("Up to {max} business days")),
            (None, None) => None,
        }
    }
}

/// One geographic entry of a zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ZoneRegion {
    /// ISO alpha-2 code, or `*` for anywhere.
    pub country_code: String,
    /// Narrows the region to one province of `country_code`.
    pub province_code: Option<String>,
}

impl ZoneRegion {
    /// How specifically this region covers `address`; `None` if it does not.
    ///
    /// 3 = country and province, 2 = whole country, 1 = wildcard.
    #[must_use]
    pub fn specificity(&self, address: &ShippingAddress) -> Option<u8> {
        if self.country_code == WILDCARD_COUNTRY {
            return Some(1);
        }
        if !self
            .country_code
            .eq_ignore_ascii_case(address.country_code.as_str())
        {
            return None;
        }
        match (&self.province_code, &address.province_code) {
            (None, _) => Some(2),
            (Some(region), Some(dest)) if region.eq_ignore_ascii_case(dest) => Some(3),
            _ => None,
        }
    }

    /// Check the region's codes.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed codes or a wildcard with a province.
    pub fn validate(&self) -> Result<Self, ValidationError> {
        let country = self.country_code.trim();
        let province = validation::optional_text(self.province_code.as_deref())
            .map(|p| p.to_ascii_uppercase());

        if country == WILDCARD_COUNTRY {
            if province.is_some() {
                return Err(ValidationError::invalid(
                    "province_code",
                    "a wildcard region cannot name a province",
                ));
            }
            return Ok(Self {
                country_code: WILDCARD_COUNTRY.to_owned(),
                province_code: None,
            });
        }

        let code = crate::types::CountryCode::parse(country)
            .map_err(|e| ValidationError::invalid("country_code", e.to_string()))?;
        Ok(Self {
            country_code: code.as_str().to_owned(),
            province_code: province,
        })
    }
}

/// A geography-scoped container of rates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingZone {
    pub id: ShippingZoneId,
    pub store_id: StoreId,
    pub name: String,
    pub regions: Vec<ZoneRegion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShippingZone {
    /// Best region score for `address`.
    #[must_use]
    pub fn specificity(&self, address: &ShippingAddress) -> Option<u8> {
        self.regions
            .iter()
            .filter_map(|r| r.specificity(address))
            .max()
    }
}

/// A priced shipping option inside a zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingRate {
    pub id: ShippingRateId,
    pub zone_id: ShippingZoneId,
    pub method_id: Option<ShippingMethodId>,
    pub name: String,
    pub rate_type: ShippingRateType,
    /// Base price. Always zero for free rates.
    pub amount: Decimal,
    /// Weight-based surcharge per started kilogram above `min_weight_grams`.
    pub per_kg_amount: Option<Decimal>,
    /// Inclusive lower weight bound.
    pub min_weight_grams: Option<i32>,
    /// Exclusive upper weight bound.
    pub max_weight_grams: Option<i32>,
    /// Inclusive lower subtotal bound (price-based and free rates).
    pub min_subtotal: Option<Decimal>,
    /// Exclusive upper subtotal bound (price-based rates).
    pub max_subtotal: Option<Decimal>,
    pub is_active: bool,
}

/// What a rate is priced against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateContext {
    /// Merchandise subtotal after product discounts.
    pub subtotal: Decimal,
    pub total_weight_grams: i64,
}

fn within<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.is_none_or(|lo| value >= lo) && max.is_none_or(|hi| value < hi)
}

impl ShippingRate {
    /// Price of this rate for `ctx`, or `None` if the rate does not apply.
    #[must_use]
    pub fn price_for(&self, ctx: &RateContext) -> Option<Decimal> {
        if !self.is_active {
            return None;
        }

        match self.rate_type {
            ShippingRateType::Flat => Some(round_money(self.amount)),
            ShippingRateType::WeightBased => {
                let min = self.min_weight_grams.map(i64::from);
                let max = self.max_weight_grams.map(i64::from);
                if !within(ctx.total_weight_grams, min, max) {
                    return None;
                }
                let surcharge = self.per_kg_amount.map_or(Decimal::ZERO, |per_kg| {
                    let over = (ctx.total_weight_grams - min.unwrap_or(0)).max(0);
                    let started_kgs = (over + GRAMS_PER_KG - 1) / GRAMS_PER_KG;
                    per_kg * Decimal::from(started_kgs)
                });
                Some(round_money(self.amount + surcharge))
            }
            ShippingRateType::PriceBased => {
                within(ctx.subtotal, self.min_subtotal, self.max_subtotal)
                    .then(|| round_money(self.amount))
            }
            ShippingRateType::Free => {
                within(ctx.subtotal, self.min_subtotal, None).then_some(Decimal::ZERO)
            }
        }
    }

    /// Check write-side invariants and normalize free rates.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.name = validation::name("name", &self.name)?;
        validation::money("amount", self.amount)?;
        validation::non_negative("min_weight_grams", self.min_weight_grams)?;
        validation::non_negative("max_weight_grams", self.max_weight_grams)?;
        validation::ordered_range(
            "min_weight_grams",
            self.min_weight_grams,
            "max_weight_grams",
            self.max_weight_grams,
        )?;
        if let Some(min) = self.min_subtotal {
            validation::money("min_subtotal", min)?;
        }
        if let Some(max) = self.max_subtotal {
            validation::money("max_subtotal", max)?;
        }
        validation::ordered_range(
            "min_subtotal",
            self.min_subtotal,
            "max_subtotal",
            self.max_subtotal,
        )?;

        if let Some(per_kg) = self.per_kg_amount {
            validation::money("per_kg_amount", per_kg)?;
            if self.rate_type != ShippingRateType::WeightBased {
                return Err(ValidationError::invalid(
                    "per_kg_amount",
                    "only weight-based rates charge per kilogram",
                ));
            }
        }

        match self.rate_type {
            ShippingRateType::PriceBased
                if self.min_subtotal.is_none() && self.max_subtotal.is_none() =>
            {
                return Err(ValidationError::Required {
                    field: "min_subtotal or max_subtotal",
                });
            }
            ShippingRateType::Free => {
                if !self.amount.is_zero() {
                    return Err(ValidationError::invalid(
                        "amount",
                        "free rates cannot carry a price",
                    ));
                }
                if self.max_subtotal.is_some() {
                    return Err(ValidationError::invalid(
                        "max_subtotal",
                        "free rates only take a minimum subtotal",
                    ));
                }
            }
            _ => {}
        }

        Ok(self)
    }
}

/// A rate offered for a specific cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotedRate {
    pub rate_id: ShippingRateId,
    pub name: String,
    pub rate_type: ShippingRateType,
    pub price: Decimal,
    pub method_name: Option<String>,
    pub carrier: Option<String>,
    pub delivery_estimate: Option<String>,
}

/// Result of quoting a cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingQuote {
    /// Zone that matched the destination, if any.
    pub zone_id: Option<ShippingZoneId>,
    pub zone_name: Option<String>,
    /// Applicable rates, cheapest first.
    pub rates: Vec<QuotedRate>,
}

impl ShippingQuote {
    /// A quote with nothing on offer.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            zone_id: None,
            zone_name: None,
            rates: Vec::new(),
        }
    }

    /// Look up an offered rate.
    ///
    /// # Errors
    ///
    /// Returns [`ShippingError::RateUnavailable`] if `rate_id` is not offered.
    pub fn select(&self, rate_id: ShippingRateId) -> Result<&QuotedRate, ShippingError> {
        self.rates
            .iter()
            .find(|r| r.rate_id == rate_id)
            .ok_or(ShippingError::RateUnavailable(rate_id))
    }
}

/// Pick the most specific zone covering `address`; ties go to the lowest id.
#[must_use]
pub fn match_zone<'a>(
    zones: &'a [ShippingZone],
    address: &ShippingAddress,
) -> Option<&'a ShippingZone> {
    zones
        .iter()
        .filter_map(|zone| zone.specificity(address).map(|score| (score, zone)))
        .max_by(|(score_a, a), (score_b, b)| score_a.cmp(score_b).then(b.id.cmp(&a.id)))
        .map(|(_, zone)| zone)
}

/// Quote every applicable rate of the matched zone.
///
/// Rates of other zones are ignored even if the matched zone offers nothing.
#[must_use]
pub fn quote(
    zones: &[ShippingZone],
    rates: &[ShippingRate],
    methods: &[ShippingMethod],
    address: &ShippingAddress,
    ctx: &RateContext,
) -> ShippingQuote {
    let Some(zone) = match_zone(zones, address) else {
        return ShippingQuote::empty();
    };

    let mut offered: Vec<QuotedRate> = rates
        .iter()
        .filter(|rate| rate.zone_id == zone.id)
        .filter_map(|rate| {
            let price = rate.price_for(ctx)?;
            let method = rate
                .method_id
                .and_then(|id| methods.iter().find(|m| m.id == id));
            Some(QuotedRate {
                rate_id: rate.id,
                name: rate.name.clone(),
                rate_type: rate.rate_type,
                price,
                method_name: method.map(|m| m.name.clone()),
                carrier: method.and_then(|m| m.carrier.clone()),
                delivery_estimate: method.and_then(ShippingMethod::delivery_estimate),
            })
        })
        .collect();

    offered.sort_by(|a, b| {
        a.price
            .cmp(&b.price)
            .then_with(|| a.name.cmp(&b.name))
            .then(a.rate_id.cmp(&b.rate_id))
    });

    ShippingQuote {
        zone_id: Some(zone.id),
        zone_name: Some(zone.name.clone()),
        rates: offered,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::types::CountryCode;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn region(country: &str, province: Option<&str>) -> ZoneRegion {
        ZoneRegion {
            country_code: country.to_owned(),
            province_code: province.map(str::to_owned),
        }
    }

    fn zone(id: i32, name: &str, regions: Vec<ZoneRegion>) -> ShippingZone {
        ShippingZone {
            id: ShippingZoneId::new(id),
            store_id: StoreId::new(1),
            name: name.to_owned(),
            regions,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn rate(id: i32, zone: i32, rate_type: ShippingRateType, amount: &str) -> ShippingRate {
        ShippingRate {
            id: ShippingRateId::new(id),
            zone_id: ShippingZoneId::new(zone),
            method_id: None,
            name: format!("rate-{id}"),
            rate_type,
            amount: dec(amount),
            per_kg_amount: None,
            min_weight_grams: None,
            max_weight_grams: None,
            min_subtotal: None,
            max_subtotal: None,
            is_active: true,
        }
    }

    fn address(country: &str, province: Option<&str>) -> ShippingAddress {
        ShippingAddress::country(CountryCode::parse(country).unwrap()).with_province(province)
    }

    fn ctx(subtotal: &str, grams: i64) -> RateContext {
        RateContext {
            subtotal: dec(subtotal),
            total_weight_grams: grams,
        }
    }

    #[test]
    fn test_most_specific_zone_wins() {
        let zones = vec![
            zone(1, "World", vec![region("*", None)]),
            zone(2, "US", vec![region("US", None)]),
            zone(3, "California", vec![region("US", Some("CA"))]),
        ];

        assert_eq!(match_zone(&zones, &address("US", Some("ca"))).unwrap().id.as_i32(), 3);
        assert_eq!(match_zone(&zones, &address("US", Some("NY"))).unwrap().id.as_i32(), 2);
        assert_eq!(match_zone(&zones, &address("US", None)).unwrap().id.as_i32(), 2);
        assert_eq!(match_zone(&zones, &address("FR", None)).unwrap().id.as_i32(), 1);
    }

    #[test]
    fn test_zone_tie_goes_to_lowest_id_and_empty_zones_never_match() {
        let zones = vec![
            zone(7, "Later", vec![region("DE", None)]),
            zone(4, "Earlier", vec![region("DE", None)]),
            zone(1, "Empty", vec![]),
        ];
        assert_eq!(match_zone(&zones, &address("DE", None)).unwrap().id.as_i32(), 4);
        assert!(match_zone(&zones, &address("AT", None)).is_none());
    }

    #[test]
    fn test_province_region_requires_province() {
        let r = region("CA", Some("QC"));
        assert_eq!(r.specificity(&address("CA", None)), None);
        assert_eq!(r.specificity(&address("CA", Some("ON"))), None);
        assert_eq!(r.specificity(&address("CA", Some("qc"))), Some(3));
    }

    #[test]
    fn test_flat_rate() {
        let r = rate(1, 1, ShippingRateType::Flat, "5.00");
        assert_eq!(r.price_for(&ctx("0", 0)), Some(dec("5.00")));
        let mut inactive = r;
        inactive.is_active = false;
        assert_eq!(inactive.price_for(&ctx("10", 0)), None);
    }

    #[test]
    fn test_weight_band_is_half_open() {
        let mut r = rate(1, 1, ShippingRateType::WeightBased, "8.00");
        r.min_weight_grams = Some(1000);
        r.max_weight_grams = Some(5000);

        assert_eq!(r.price_for(&ctx("0", 999)), None);
        assert_eq!(r.price_for(&ctx("0", 1000)), Some(dec("8.00")));
        assert_eq!(r.price_for(&ctx("0", 4999)), Some(dec("8.00")));
        assert_eq!(r.price_for(&ctx("0", 5000)), None);
    }

    #[test]
    fn test_weight_surcharge_per_started_kg() {
        let mut r = rate(1, 1, ShippingRateType::WeightBased, "4.00");
        r.min_weight_grams = Some(500);
        r.per_kg_amount = Some(dec("1.50"));

        assert_eq!(r.price_for(&ctx("0", 500)), Some(dec("4.00")));
        assert_eq!(r.price_for(&ctx("0", 501)), Some(dec("5.50")));
        assert_eq!(r.price_for(&ctx("0", 1500)), Some(dec("5.50")));
        assert_eq!(r.price_for(&ctx("0", 1501)), Some(dec("7.00")));
    }

    #[test]
    fn test_price_band() {
        let mut r = rate(1, 1, ShippingRateType::PriceBased, "6.00");
        r.min_subtotal = Some(dec("0"));
        r.max_subtotal = Some(dec("50"));

        assert_eq!(r.price_for(&ctx("49.99", 0)), Some(dec("6.00")));
        assert_eq!(r.price_for(&ctx("50.00", 0)), None);
    }

    #[test]
    fn test_free_threshold() {
        let mut r = rate(1, 1, ShippingRateType::Free, "0");
        r.min_subtotal = Some(dec("75"));
        assert_eq!(r.price_for(&ctx("74.99", 0)), None);
        assert_eq!(r.price_for(&ctx("75", 0)), Some(Decimal::ZERO));

        let unconditional = rate(2, 1, ShippingRateType::Free, "0");
        assert_eq!(unconditional.price_for(&ctx("0", 0)), Some(Decimal::ZERO));
    }

    #[test]
    fn test_quote_only_uses_matched_zone_and_sorts() {
        let zones = vec![
            zone(1, "World", vec![region("*", None)]),
            zone(2, "US", vec![region("US", None)]),
        ];
        let methods = vec![ShippingMethod {
            id: ShippingMethodId::new(1),
            store_id: StoreId::new(1),
            name: "Express".to_owned(),
            carrier: Some("UPS".to_owned()),
            min_delivery_days: Some(1),
            max_delivery_days: Some(2),
        }];
        let mut express = rate(10, 2, ShippingRateType::Flat, "15.00");
        express.method_id = Some(ShippingMethodId::new(1));
        let mut free = rate(11, 2, ShippingRateType::Free, "0");
        free.min_subtotal = Some(dec("100"));
        let rates = vec![
            express,
            rate(12, 2, ShippingRateType::Flat, "5.00"),
            free,
            rate(13, 1, ShippingRateType::Flat, "1.00"),
        ];

        let q = quote(&zones, &rates, &methods, &address("US", None), &ctx("40", 0));
        assert_eq!(q.zone_id, Some(ShippingZoneId::new(2)));
        let ids: Vec<i32> = q.rates.iter().map(|r| r.rate_id.as_i32()).collect();
        assert_eq!(ids, vec![12, 10]);
        assert_eq!(q.rates[1].carrier.as_deref(), Some("UPS"));
        assert_eq!(q.rates[1].delivery_estimate.as_deref(), Some("1-2 business days"));

        let q = quote(&zones, &rates, &methods, &address("US", None), &ctx("150", 0));
        assert_eq!(q.rates[0].rate_id, ShippingRateId::new(11));
        assert_eq!(q.rates[0].price, Decimal::ZERO);
    }

    #[test]
    fn test_specific_zone_without_rates_blocks_fallback() {
        let zones = vec![
            zone(1, "World", vec![region("*", None)]),
            zone(2, "Nowhere", vec![region("KP", None)]),
        ];
        let rates = vec![rate(1, 1, ShippingRateType::Flat, "20")];
        let q = quote(&zones, &rates, &[], &address("KP", None), &ctx("10", 0));
        assert_eq!(q.zone_id, Some(ShippingZoneId::new(2)));
        assert!(q.rates.is_empty());
    }

    #[test]
    fn test_select_rejects_unoffered_rate() {
        let zones = vec![zone(1, "US", vec![region("US", None)])];
        let rates = vec![rate(1, 1, ShippingRateType::Flat, "5")];
        let q = quote(&zones, &rates, &[], &address("US", None), &ctx("10", 0));
        assert!(q.select(ShippingRateId::new(1)).is_ok());
        assert_eq!(
            q.select(ShippingRateId::new(2)),
            Err(ShippingError::RateUnavailable(ShippingRateId::new(2)))
        );
        assert!(ShippingQuote::empty().select(ShippingRateId::new(1)).is_err());
    }

    #[test]
    fn test_validate_rate_rules() {
        let mut free = rate(1, 1, ShippingRateType::Free, "3.00");
        assert!(free.clone().validate().is_err());
        free.amount = Decimal::ZERO;
        assert!(free.validate().is_ok());

        let price_based = rate(2, 1, ShippingRateType::PriceBased, "4.00");
        assert!(matches!(
            price_based.validate(),
            Err(ValidationError::Required { .. })
        ));

        let mut flat = rate(3, 1, ShippingRateType::Flat, "4.00");
        flat.per_kg_amount = Some(dec("1"));
        assert!(flat.validate().is_err());

        let mut weight = rate(4, 1, ShippingRateType::WeightBased, "4.00");
        weight.min_weight_grams = Some(2000);
        weight.max_weight_grams = Some(1000);
        assert!(matches!(
            weight.validate(),
            Err(ValidationError::InvertedRange { .. })
        ));
    }

    #[test]
    fn test_region_validation() {
        assert_eq!(
            region(" us ", Some(" ny ")).validate().unwrap(),
            region("US", Some("NY"))
        );
        assert!(region("*", Some("NY")).validate().is_err());
        assert!(region("USA", None).validate().is_err());
    }
}
