//! Shipping method, zone and rate route handlers, plus a quote preview.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use tillbox_core::shipping::{
    self, RateContext, ShippingMethod, ShippingQuote, ShippingRate, ShippingZone,
};
use tillbox_core::validation::ValidationError;
use tillbox_core::{
    CountryCode, ShippingAddress, ShippingMethodId, ShippingRateId, ShippingZoneId, StoreId,
};

use crate::db::ShippingRepository;
use crate::error::AppError;
use crate::models::shipping::{
    CreateMethodInput, CreateRateInput, CreateZoneInput, UpdateMethodInput, UpdateRateInput,
    UpdateZoneInput,
};
use crate::state::AppState;

// =============================================================================
// Methods
// =============================================================================

#[instrument(skip(state))]
pub async fn list_methods(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
) -> Result<Json<Vec<ShippingMethod>>, AppError> {
    Ok(Json(ShippingRepository::new(state.pool()).list_methods(store_id).await?))
}

#[instrument(skip(state))]
pub async fn show_method(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, ShippingMethodId)>,
) -> Result<Json<ShippingMethod>, AppError> {
    Ok(Json(ShippingRepository::new(state.pool()).get_method(store_id, id).await?))
}

#[instrument(skip(state, input))]
pub async fn create_method(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
    Json(input): Json<CreateMethodInput>,
) -> Result<(StatusCode, Json<ShippingMethod>), AppError> {
    let fields = input.validate()?;
    let method = ShippingRepository::new(state.pool())
        .create_method(store_id, &fields)
        .await?;
    Ok((StatusCode::CREATED, Json(method)))
}

#[instrument(skip(state, input))]
pub async fn update_method(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, ShippingMethodId)>,
    Json(input): Json<UpdateMethodInput>,
) -> Result<Json<ShippingMethod>, AppError> {
    let repo = ShippingRepository::new(state.pool());
    let current = repo.get_method(store_id, id).await?;
    let fields = input.apply(&current)?;
    Ok(Json(repo.update_method(store_id, id, &fields).await?))
}

#[instrument(skip(state))]
pub async fn delete_method(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, ShippingMethodId)>,
) -> Result<StatusCode, AppError> {
    ShippingRepository::new(state.pool()).delete_method(store_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Zones
// =============================================================================

#[instrument(skip(state))]
pub async fn list_zones(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
) -> Result<Json<Vec<ShippingZone>>, AppError> {
    Ok(Json(ShippingRepository::new(state.pool()).list_zones(store_id).await?))
}

#[instrument(skip(state))]
pub async fn show_zone(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, ShippingZoneId)>,
) -> Result<Json<ShippingZone>, AppError> {
    Ok(Json(ShippingRepository::new(state.pool()).get_zone(store_id, id).await?))
}

#[instrument(skip(state, input))]
pub async fn create_zone(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
    Json(input): Json<CreateZoneInput>,
) -> Result<(StatusCode, Json<ShippingZone>), AppError> {
    let fields = input.validate()?;
    let zone = ShippingRepository::new(state.pool())
        .create_zone(store_id, &fields)
        .await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

/// Patch a zone. A `regions` list replaces every stored region.
#[instrument(skip(state, input))]
pub async fn update_zone(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, ShippingZoneId)>,
    Json(input): Json<UpdateZoneInput>,
) -> Result<Json<ShippingZone>, AppError> {
    let repo = ShippingRepository::new(state.pool());
    let current = repo.get_zone(store_id, id).await?;
    let fields = input.apply(&current.name)?;
    Ok(Json(repo.update_zone(store_id, id, &fields).await?))
}

#[instrument(skip(state))]
pub async fn delete_zone(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, ShippingZoneId)>,
) -> Result<StatusCode, AppError> {
    ShippingRepository::new(state.pool()).delete_zone(store_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Rates
// =============================================================================

#[instrument(skip(state))]
pub async fn list_rates(
    State(state): State<AppState>,
    Path((store_id, zone_id)): Path<(StoreId, ShippingZoneId)>,
) -> Result<Json<Vec<ShippingRate>>, AppError> {
    let rates = ShippingRepository::new(state.pool())
        .list_rates(store_id, zone_id)
        .await?;
    Ok(Json(rates))
}

#[instrument(skip(state))]
pub async fn show_rate(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, ShippingRateId)>,
) -> Result<Json<ShippingRate>, AppError> {
    Ok(Json(ShippingRepository::new(state.pool()).get_rate(store_id, id).await?))
}

#[instrument(skip(state, input))]
pub async fn create_rate(
    State(state): State<AppState>,
    Path((store_id, zone_id)): Path<(StoreId, ShippingZoneId)>,
    Json(input): Json<CreateRateInput>,
) -> Result<(StatusCode, Json<ShippingRate>), AppError> {
    let rate = input.validate(zone_id)?;
    let rate = ShippingRepository::new(state.pool())
        .create_rate(store_id, &rate)
        .await?;
    Ok((StatusCode::CREATED, Json(rate)))
}

#[instrument(skip(state, input))]
pub async fn update_rate(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, ShippingRateId)>,
    Json(input): Json<UpdateRateInput>,
) -> Result<Json<ShippingRate>, AppError> {
    let repo = ShippingRepository::new(state.pool());
    let current = repo.get_rate(store_id, id).await?;
    let rate = input.apply(&current)?;
    Ok(Json(repo.update_rate(store_id, &rate).await?))
}

#[instrument(skip(state))]
pub async fn delete_rate(
    State(state): State<AppState>,
    Path((store_id, id)): Path<(StoreId, ShippingRateId)>,
) -> Result<StatusCode, AppError> {
    ShippingRepository::new(state.pool()).delete_rate(store_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Quote preview
// =============================================================================

/// Query for `GET /api/stores/{store_id}/shipping/quote`.
#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub country: String,
    pub province: Option<String>,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub weight_grams: i64,
}

impl QuoteQuery {
    /// Split into a destination and a rate context.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad country code or negative amounts.
    pub fn into_parts(self) -> Result<(ShippingAddress, RateContext), ValidationError> {
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
        let address = ShippingAddress::country(country).with_province(self.province.as_deref());
        Ok((
            address,
            RateContext {
                subtotal: self.subtotal,
                total_weight_grams: self.weight_grams,
            },
        ))
    }
}

/// Preview what a cart with these totals would be offered.
#[instrument(skip(state))]
pub async fn quote(
    State(state): State<AppState>,
    Path(store_id): Path<StoreId>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<ShippingQuote>, AppError> {
    let (address, ctx) = query.into_parts()?;
    let config = ShippingRepository::new(state.pool())
        .load_config(store_id)
        .await?;
    Ok(Json(shipping::quote(
        &config.zones,
        &config.rates,
        &config.methods,
        &address,
        &ctx,
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn query(country: &str, province: Option<&str>, subtotal: &str, weight: i64) -> QuoteQuery {
        QuoteQuery {
            country: country.to_owned(),
            province: province.map(str::to_owned),
            subtotal: subtotal.parse().unwrap(),
            weight_grams: weight,
        }
    }

    #[test]
    fn test_quote_query_into_parts() {
        let (address, ctx) = query("us", Some("ca"), "42.50", 900).into_parts().unwrap();
        assert_eq!(address.country_code.as_str(), "US");
        assert_eq!(address.province_code.as_deref(), Some("CA"));
        assert_eq!(ctx.total_weight_grams, 900);
        assert_eq!(ctx.subtotal, "42.50".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_quote_query_rejects_bad_input() {
        assert!(query("USA", None, "1", 0).into_parts().is_err());
        assert!(query("US", None, "-1", 0).into_parts().is_err());
        assert!(query("US", None, "1", -5).into_parts().is_err());
    }
}
