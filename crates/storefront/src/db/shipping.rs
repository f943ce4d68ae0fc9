//! Shipping configuration reads for quoting.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use tillbox_core::shipping::{ShippingMethod, ShippingRate, ShippingZone, ZoneRegion};
use tillbox_core::{ShippingMethodId, ShippingRateId, ShippingZoneId, StoreId};

use super::{RepositoryError, parse_column};

/// Zones, active rates and methods of one store.
#[derive(Debug, Clone, Default)]
pub struct ShippingConfig {
    pub zones: Vec<ShippingZone>,
    pub rates: Vec<ShippingRate>,
    pub methods: Vec<ShippingMethod>,
}

#[derive(Debug, sqlx::FromRow)]
struct ZoneRow {
    id: i32,
    store_id: i32,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct RateRow {
    id: i32,
    zone_id: i32,
    method_id: Option<i32>,
    name: String,
    rate_type: String,
    amount: Decimal,
    per_kg_amount: Option<Decimal>,
    min_weight_grams: Option<i32>,
    max_weight_grams: Option<i32>,
    min_subtotal: Option<Decimal>,
    max_subtotal: Option<Decimal>,
    is_active: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct MethodRow {
    id: i32,
    store_id: i32,
    name: String,
    carrier: Option<String>,
    min_delivery_days: Option<i32>,
    max_delivery_days: Option<i32>,
}

/// Load everything `tillbox_core::shipping::quote` needs for a store.
///
/// # Errors
///
/// Returns `RepositoryError` if a query fails or a rate type is unknown.
pub async fn load_shipping_config(
    pool: &PgPool,
    store_id: StoreId,
) -> Result<ShippingConfig, RepositoryError> {
    let zone_rows: Vec<ZoneRow> = sqlx::query_as(
        "SELECT id, store_id, name, created_at, updated_at FROM commerce.shipping_zone WHERE store_id = $1 ORDER BY id",
    )
    .bind(store_id)
    .fetch_all(pool)
    .await?;

    let regions: Vec<(i32, String, Option<String>)> = sqlx::query_as(
        r"
        SELECT r.zone_id, r.country_code, r.province_code
        FROM commerce.shipping_zone_region r
        JOIN commerce.shipping_zone z ON z.id = r.zone_id
        WHERE z.store_id = $1
        ORDER BY r.zone_id, r.id
        ",
    )
    .bind(store_id)
    .fetch_all(pool)
    .await?;

    let rate_rows: Vec<RateRow> = sqlx::query_as(
        r"
        SELECT r.id, r.zone_id, r.method_id, r.name, r.rate_type, r.amount, r.per_kg_amount,
               r.min_weight_grams, r.max_weight_grams, r.min_subtotal, r.max_subtotal,
               r.is_active
        FROM commerce.shipping_rate r
        JOIN commerce.shipping_zone z ON z.id = r.zone_id
        WHERE z.store_id = $1 AND r.is_active
        ORDER BY r.zone_id, r.id
        ",
    )
    .bind(store_id)
    .fetch_all(pool)
    .await?;

    let method_rows: Vec<MethodRow> = sqlx::query_as(
        r"
        SELECT id, store_id, name, carrier, min_delivery_days, max_delivery_days
        FROM commerce.shipping_method
        WHERE store_id = $1
        ",
    )
    .bind(store_id)
    .fetch_all(pool)
    .await?;

    let mut by_zone: HashMap<i32, Vec<ZoneRegion>> = HashMap::new();
    for (zone_id, country_code, province_code) in regions {
        by_zone.entry(zone_id).or_default().push(ZoneRegion {
            country_code,
            province_code,
        });
    }

    let zones = zone_rows
        .into_iter()
        .map(|row| ShippingZone {
            id: ShippingZoneId::new(row.id),
            store_id: StoreId::new(row.store_id),
            name: row.name,
            regions: by_zone.remove(&row.id).unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect();

    let rates = rate_rows
        .into_iter()
        .map(|row| {
            Ok(ShippingRate {
                id: ShippingRateId::new(row.id),
                zone_id: ShippingZoneId::new(row.zone_id),
                method_id: row.method_id.map(ShippingMethodId::new),
                name: row.name,
                rate_type: parse_column(&row.rate_type)?,
                amount: row.amount,
                per_kg_amount: row.per_kg_amount,
                min_weight_grams: row.min_weight_grams,
                max_weight_grams: row.max_weight_grams,
                min_subtotal: row.min_subtotal,
                max_subtotal: row.max_subtotal,
                is_active: row.is_active,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

    let methods = method_rows
        .into_iter()
        .map(|row| ShippingMethod {
            id: ShippingMethodId::new(row.id),
            store_id: StoreId::new(row.store_id),
            name: row.name,
            carrier: row.carrier,
            min_delivery_days: row.min_delivery_days,
            max_delivery_days: row.max_delivery_days,
        })
        .collect();

    Ok(ShippingConfig {
        zones,
        rates,
        methods,
    })
}
