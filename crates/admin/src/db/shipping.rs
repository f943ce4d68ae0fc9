//! Shipping method, zone, region and rate persistence.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use tillbox_core::shipping::{ShippingMethod, ShippingRate, ShippingZone, ZoneRegion};
use tillbox_core::{ShippingMethodId, ShippingRateId, ShippingZoneId, StoreId};

use super::{RepositoryError, ensure_owned, parse_column};
use crate::models::shipping::{MethodFields, ZoneFields};

const RATE_COLUMNS: &str = "r.id, r.zone_id, r.method_id, r.name, r.rate_type, r.amount, \
     r.per_kg_amount, r.min_weight_grams, r.max_weight_grams, r.min_subtotal, r.max_subtotal, \
     r.is_active";

#[derive(Debug, sqlx::FromRow)]
struct MethodRow {
    id: i32,
    store_id: i32,
    name: String,
    carrier: Option<String>,
    min_delivery_days: Option<i32>,
    max_delivery_days: Option<i32>,
}

impl From<MethodRow> for ShippingMethod {
    fn from(row: MethodRow) -> Self {
        Self {
            id: ShippingMethodId::new(row.id),
            store_id: StoreId::new(row.store_id),
            name: row.name,
            carrier: row.carrier,
            min_delivery_days: row.min_delivery_days,
            max_delivery_days: row.max_delivery_days,
        }
    }
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

impl TryFrom<RateRow> for ShippingRate {
    type Error = RepositoryError;

    fn try_from(row: RateRow) -> Result<Self, Self::Error> {
        Ok(Self {
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
    }
}

/// Everything needed to quote shipping for one store.
#[derive(Debug, Clone, Default)]
pub struct ShippingConfig {
    pub zones: Vec<ShippingZone>,
    pub rates: Vec<ShippingRate>,
    pub methods: Vec<ShippingMethod>,
}

/// Repository for shipping configuration.
pub struct ShippingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShippingRepository<'a> {
    /// Create a new repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // -------------------------------------------------------------------------
    // Methods
    // -------------------------------------------------------------------------

    /// List a store's shipping methods.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_methods(&self, store_id: StoreId) -> Result<Vec<ShippingMethod>, RepositoryError> {
        let rows: Vec<MethodRow> = sqlx::query_as(
            r"
            SELECT id, store_id, name, carrier, min_delivery_days, max_delivery_days
            FROM commerce.shipping_method
            WHERE store_id = $1
            ORDER BY name, id
            ",
        )
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get one shipping method of a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the method is not in the store.
    pub async fn get_method(
        &self,
        store_id: StoreId,
        id: ShippingMethodId,
    ) -> Result<ShippingMethod, RepositoryError> {
        let row: Option<MethodRow> = sqlx::query_as(
            r"
            SELECT id, store_id, name, carrier, min_delivery_days, max_delivery_days
            FROM commerce.shipping_method
            WHERE store_id = $1 AND id = $2
            ",
        )
        .bind(store_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Create a shipping method.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_method(
        &self,
        store_id: StoreId,
        fields: &MethodFields,
    ) -> Result<ShippingMethod, RepositoryError> {
        let row: MethodRow = sqlx::query_as(
            r"
            INSERT INTO commerce.shipping_method (store_id, name, carrier, min_delivery_days, max_delivery_days)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, store_id, name, carrier, min_delivery_days, max_delivery_days
            ",
        )
        .bind(store_id)
        .bind(&fields.name)
        .bind(&fields.carrier)
        .bind(fields.min_delivery_days)
        .bind(fields.max_delivery_days)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "shipping method"))?;
        Ok(row.into())
    }

    /// Replace a shipping method's columns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the method is not in the store.
    pub async fn update_method(
        &self,
        store_id: StoreId,
        id: ShippingMethodId,
        fields: &MethodFields,
    ) -> Result<ShippingMethod, RepositoryError> {
        let row: Option<MethodRow> = sqlx::query_as(
            r"
            UPDATE commerce.shipping_method
            SET name = $3, carrier = $4, min_delivery_days = $5, max_delivery_days = $6
            WHERE store_id = $1 AND id = $2
            RETURNING id, store_id, name, carrier, min_delivery_days, max_delivery_days
            ",
        )
        .bind(store_id)
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.carrier)
        .bind(fields.min_delivery_days)
        .bind(fields.max_delivery_days)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "shipping method"))?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Delete a shipping method. Rates referencing it keep working without one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the method is not in the store.
    pub async fn delete_method(
        &self,
        store_id: StoreId,
        id: ShippingMethodId,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM commerce.shipping_method WHERE store_id = $1 AND id = $2")
                .bind(store_id)
                .bind(id)
                .execute(self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Zones
    // -------------------------------------------------------------------------

    /// List a store's zones with their regions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_zones(&self, store_id: StoreId) -> Result<Vec<ShippingZone>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        zones_of(&mut conn, store_id, None).await
    }

    /// Get one zone of a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the zone is not in the store.
    pub async fn get_zone(
        &self,
        store_id: StoreId,
        id: ShippingZoneId,
    ) -> Result<ShippingZone, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        zones_of(&mut conn, store_id, Some(id))
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound)
    }

    /// Create a zone and its regions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_zone(
        &self,
        store_id: StoreId,
        fields: &ZoneFields,
    ) -> Result<ShippingZone, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO commerce.shipping_zone (store_id, name) VALUES ($1, $2) RETURNING id",
        )
        .bind(store_id)
        .bind(&fields.name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "shipping zone"))?;

        let id = ShippingZoneId::new(id);
        if let Some(regions) = &fields.regions {
            replace_regions(&mut tx, id, regions).await?;
        }

        let zone = zones_of(&mut tx, store_id, Some(id))
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(zone)
    }

    /// Rename a zone and, when given, replace its regions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the zone is not in the store.
    pub async fn update_zone(
        &self,
        store_id: StoreId,
        id: ShippingZoneId,
        fields: &ZoneFields,
    ) -> Result<ShippingZone, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE commerce.shipping_zone SET name = $3, updated_at = NOW() WHERE store_id = $1 AND id = $2",
        )
        .bind(store_id)
        .bind(id)
        .bind(&fields.name)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        if let Some(regions) = &fields.regions {
            replace_regions(&mut tx, id, regions).await?;
        }

        let zone = zones_of(&mut tx, store_id, Some(id))
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(zone)
    }

    /// Delete a zone with its regions and rates.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the zone is not in the store.
    pub async fn delete_zone(&self, store_id: StoreId, id: ShippingZoneId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM commerce.shipping_zone WHERE store_id = $1 AND id = $2")
                .bind(store_id)
                .bind(id)
                .execute(self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Rates
    // -------------------------------------------------------------------------

    /// List the rates of one zone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the zone is not in the store.
    pub async fn list_rates(
        &self,
        store_id: StoreId,
        zone_id: ShippingZoneId,
    ) -> Result<Vec<ShippingRate>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        ensure_owned(&mut conn, "shipping_zone", store_id, &[zone_id.as_i32()]).await?;
        rates_of(&mut conn, store_id, Some(zone_id)).await
    }

    /// Get one rate of a store.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rate is not in the store.
    pub async fn get_rate(
        &self,
        store_id: StoreId,
        id: ShippingRateId,
    ) -> Result<ShippingRate, RepositoryError> {
        let row: Option<RateRow> = sqlx::query_as(&format!(
            r"
            SELECT {RATE_COLUMNS}
            FROM commerce.shipping_rate r
            JOIN commerce.shipping_zone z ON z.id = r.zone_id
            WHERE z.store_id = $1 AND r.id = $2
            "
        ))
        .bind(store_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Create a rate in `rate.zone_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the zone or method is not in the store.
    pub async fn create_rate(
        &self,
        store_id: StoreId,
        rate: &ShippingRate,
    ) -> Result<ShippingRate, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        ensure_owned(&mut tx, "shipping_zone", store_id, &[rate.zone_id.as_i32()]).await?;
        if let Some(method_id) = rate.method_id {
            ensure_owned(&mut tx, "shipping_method", store_id, &[method_id.as_i32()]).await?;
        }

        let row: RateRow = sqlx::query_as(&format!(
            r"
            INSERT INTO commerce.shipping_rate AS r (
                zone_id, method_id, name, rate_type, amount, per_kg_amount,
                min_weight_grams, max_weight_grams, min_subtotal, max_subtotal, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {RATE_COLUMNS}
            "
        ))
        .bind(rate.zone_id)
        .bind(rate.method_id)
        .bind(&rate.name)
        .bind(rate.rate_type.as_str())
        .bind(rate.amount)
        .bind(rate.per_kg_amount)
        .bind(rate.min_weight_grams)
        .bind(rate.max_weight_grams)
        .bind(rate.min_subtotal)
        .bind(rate.max_subtotal)
        .bind(rate.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "shipping rate"))?;

        tx.commit().await?;
        row.try_into()
    }

    /// Replace a rate's columns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rate or method is not in the store.
    pub async fn update_rate(
        &self,
        store_id: StoreId,
        rate: &ShippingRate,
    ) -> Result<ShippingRate, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if let Some(method_id) = rate.method_id {
            ensure_owned(&mut tx, "shipping_method", store_id, &[method_id.as_i32()]).await?;
        }

        let row: Option<RateRow> = sqlx::query_as(&format!(
            r"
            UPDATE commerce.shipping_rate AS r
            SET method_id = $3, name = $4, rate_type = $5, amount = $6, per_kg_amount = $7,
                min_weight_grams = $8, max_weight_grams = $9, min_subtotal = $10,
                max_subtotal = $11, is_active = $12
            FROM commerce.shipping_zone z
            WHERE z.id = r.zone_id AND z.store_id = $1 AND r.id = $2
            RETURNING {RATE_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(rate.id)
        .bind(rate.method_id)
        .bind(&rate.name)
        .bind(rate.rate_type.as_str())
        .bind(rate.amount)
        .bind(rate.per_kg_amount)
        .bind(rate.min_weight_grams)
        .bind(rate.max_weight_grams)
        .bind(rate.min_subtotal)
        .bind(rate.max_subtotal)
        .bind(rate.is_active)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_write(e, "shipping rate"))?;

        let rate = row.ok_or(RepositoryError::NotFound)?.try_into()?;
        tx.commit().await?;
        Ok(rate)
    }

    /// Delete a rate. Carts that selected it lose their selection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the rate is not in the store.
    pub async fn delete_rate(&self, store_id: StoreId, id: ShippingRateId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM commerce.shipping_rate r
            USING commerce.shipping_zone z
            WHERE z.id = r.zone_id AND z.store_id = $1 AND r.id = $2
            ",
        )
        .bind(store_id)
        .bind(id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Load zones, rates and methods for quoting.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn load_config(&self, store_id: StoreId) -> Result<ShippingConfig, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let zones = zones_of(&mut conn, store_id, None).await?;
        let rates = rates_of(&mut conn, store_id, None).await?;
        let methods = self.list_methods(store_id).await?;
        Ok(ShippingConfig {
            zones,
            rates,
            methods,
        })
    }
}

async fn replace_regions(
    conn: &mut PgConnection,
    zone_id: ShippingZoneId,
    regions: &[ZoneRegion],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM commerce.shipping_zone_region WHERE zone_id = $1")
        .bind(zone_id)
        .execute(&mut *conn)
        .await?;

    let countries: Vec<&str> = regions.iter().map(|r| r.country_code.as_str()).collect();
    let provinces: Vec<Option<&str>> = regions.iter().map(|r| r.province_code.as_deref()).collect();
    sqlx::query(
        r"
        INSERT INTO commerce.shipping_zone_region (zone_id, country_code, province_code)
        SELECT $1, v.country_code, v.province_code
        FROM UNNEST($2::text[], $3::text[]) AS v(country_code, province_code)
        ",
    )
    .bind(zone_id)
    .bind(countries)
    .bind(provinces)
    .execute(&mut *conn)
    .await
    .map_err(|e| RepositoryError::from_write(e, "shipping region"))?;
    Ok(())
}

/// Zones of a store (or just `only`), regions attached, ordered by id.
async fn zones_of(
    conn: &mut PgConnection,
    store_id: StoreId,
    only: Option<ShippingZoneId>,
) -> Result<Vec<ShippingZone>, RepositoryError> {
    let rows: Vec<ZoneRow> = sqlx::query_as(
        r"
        SELECT id, store_id, name, created_at, updated_at
        FROM commerce.shipping_zone
        WHERE store_id = $1 AND ($2::int IS NULL OR id = $2)
        ORDER BY id
        ",
    )
    .bind(store_id)
    .bind(only)
    .fetch_all(&mut *conn)
    .await?;

    let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
    let regions: Vec<(i32, String, Option<String>)> = sqlx::query_as(
        r"
        SELECT zone_id, country_code, province_code
        FROM commerce.shipping_zone_region
        WHERE zone_id = ANY($1)
        ORDER BY zone_id, id
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_zone: HashMap<i32, Vec<ZoneRegion>> = HashMap::new();
    for (zone_id, country_code, province_code) in regions {
        by_zone.entry(zone_id).or_default().push(ZoneRegion {
            country_code,
            province_code,
        });
    }

    Ok(rows
        .into_iter()
        .map(|row| ShippingZone {
            id: ShippingZoneId::new(row.id),
            store_id: StoreId::new(row.store_id),
            name: row.name,
            regions: by_zone.remove(&row.id).unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect())
}

async fn rates_of(
    conn: &mut PgConnection,
    store_id: StoreId,
    zone_id: Option<ShippingZoneId>,
) -> Result<Vec<ShippingRate>, RepositoryError> {
    let rows: Vec<RateRow> = sqlx::query_as(&format!(
        r"
        SELECT {RATE_COLUMNS}
        FROM commerce.shipping_rate r
        JOIN commerce.shipping_zone z ON z.id = r.zone_id
        WHERE z.store_id = $1 AND ($2::int IS NULL OR r.zone_id = $2)
        ORDER BY r.zone_id, r.id
        "
    ))
    .bind(store_id)
    .bind(zone_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(TryInto::try_into).collect()
}
