//! Offline shipping quote.
//!
//! ```bash
//! tillbox quote --store-slug demo --country US --province CA --subtotal 42.50 --weight-grams 1800
//! ```
//!
//! Uses the same matching and pricing as the storefront, against the store's
//! stored zones and rates.

use rust_decimal::Decimal;

use tillbox_admin::db::{ShippingRepository, StoreRepository};
use tillbox_core::shipping::{self, RateContext, ShippingQuote};
use tillbox_core::validation::ValidationError;
use tillbox_core::{CountryCode, CurrencyCode, ShippingAddress, Slug};

use super::{CommandError, connect};

/// What to quote.
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub store_slug: String,
    pub country: String,
    pub province: Option<String>,
    pub subtotal: Decimal,
    pub weight_grams: i64,
}

impl QuoteRequest {
    fn parse(&self) -> Result<(Slug, ShippingAddress, RateContext), ValidationError> {
        let slug = Slug::parse(&self.store_slug)
            .map_err(|e| ValidationError::invalid("store_slug", e.to_string()))?;
        let country = CountryCode::parse(&self.country)
            .map_err(|e| ValidationError::invalid("country", e.to_string()))?;
        if self.subtotal < Decimal::ZERO {
            return Err(ValidationError::Negative { field: "subtotal" });
        }
        if self.weight_grams < 0 {
            return Err(ValidationError::Negative {
                field: "weight_grams",
            });
        }
        Ok((
            slug,
            ShippingAddress::country(country).with_province(self.province.as_deref()),
            RateContext {
                subtotal: self.subtotal,
                total_weight_grams: self.weight_grams,
            },
        ))
    }
}

/// Quote shipping and log the offered rates.
///
/// # Errors
///
/// Returns `CommandError` for bad input, an unknown store, or a database failure.
pub async fn run(request: &QuoteRequest) -> Result<ShippingQuote, CommandError> {
    let (slug, address, ctx) = request.parse()?;

    let pool = connect().await?;
    let store = StoreRepository::new(&pool).get_by_slug(&slug).await?;
    let config = ShippingRepository::new(&pool).load_config(store.id).await?;

    let quote = shipping::quote(&config.zones, &config.rates, &config.methods, &address, &ctx);
    for line in describe(&quote, store.currency) {
        tracing::info!("{line}");
    }
    Ok(quote)
}

/// Human-readable lines for a quote.
fn describe(quote: &ShippingQuote, currency: CurrencyCode) -> Vec<String> {
    let Some(zone) = &quote.zone_name else {
        return vec!["No shipping zone covers this destination".to_owned()];
    };

    let mut lines = vec![format!("Zone: {zone}")];
    if quote.rates.is_empty() {
        lines.push("  (no rates apply)".to_owned());
    }
    for rate in &quote.rates {
        let mut line = format!("  [{}] {}: {}{}", rate.rate_id, rate.name, currency.symbol(), rate.price);
        if let Some(estimate) = &rate.delivery_estimate {
            line.push_str(&format!(" ({estimate})"));
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use tillbox_core::shipping::QuotedRate;
    use tillbox_core::{ShippingRateId, ShippingRateType, ShippingZoneId};

    fn request() -> QuoteRequest {
        QuoteRequest {
            store_slug: "demo".to_owned(),
            country: "us".to_owned(),
            province: Some("ca".to_owned()),
            subtotal: "42.50".parse().unwrap(),
            weight_grams: 1800,
        }
    }

    #[test]
    fn test_parse_normalizes_address() {
        let (slug, address, ctx) = request().parse().unwrap();
        assert_eq!(slug.as_str(), "demo");
        assert_eq!(address.country_code.as_str(), "US");
        assert_eq!(address.province_code.as_deref(), Some("CA"));
        assert_eq!(ctx.total_weight_grams, 1800);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let mut bad = request();
        bad.country = "USA".to_owned();
        assert!(bad.parse().is_err());

        let mut bad = request();
        bad.weight_grams = -1;
        assert_eq!(
            bad.parse().unwrap_err(),
            ValidationError::Negative {
                field: "weight_grams"
            }
        );
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            describe(&ShippingQuote::empty(), CurrencyCode::USD),
            vec!["No shipping zone covers this destination".to_owned()]
        );

        let quote = ShippingQuote {
            zone_id: Some(ShippingZoneId::new(1)),
            zone_name: Some("Domestic".to_owned()),
            rates: vec![QuotedRate {
                rate_id: ShippingRateId::new(3),
                name: "Standard".to_owned(),
                rate_type: ShippingRateType::Flat,
                price: "5.99".parse().unwrap(),
                method_name: None,
                carrier: None,
                delivery_estimate: Some("3-5 business days".to_owned()),
            }],
        };
        let lines = describe(&quote, CurrencyCode::USD);
        assert_eq!(lines[0], "Zone: Domestic");
        assert_eq!(lines[1], "  [3] Standard: $5.99 (3-5 business days)");
    }
}
