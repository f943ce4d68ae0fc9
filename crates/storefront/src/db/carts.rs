//! Cart persistence. A cart is keyed by (store, session cart token).

use sqlx::PgPool;

use tillbox_core::{CartId, CountryCode, ProductId, ShippingAddress, ShippingRateId, StoreId};

use super::RepositoryError;

const CART_COLUMNS: &str = "id, store_id, country_code, province_code, postal_code, shipping_rate_id";

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: i32,
    store_id: i32,
    country_code: Option<String>,
    province_code: Option<String>,
    postal_code: Option<String>,
    shipping_rate_id: Option<i32>,
}

/// A stored cart without its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartRecord {
    pub id: CartId,
    pub store_id: StoreId,
    pub address: Option<ShippingAddress>,
    pub shipping_rate_id: Option<ShippingRateId>,
}

impl TryFrom<CartRow> for CartRecord {
    type Error = RepositoryError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        let address = row
            .country_code
            .map(|code| {
                CountryCode::parse(&code)
                    .map(|country| {
                        ShippingAddress::country(country)
                            .with_province(row.province_code.as_deref())
                            .with_postal_code(row.postal_code.as_deref())
                    })
                    .map_err(|e| RepositoryError::DataCorruption(format!("cart country: {e}")))
            })
            .transpose()?;

        Ok(Self {
            id: CartId::new(row.id),
            store_id: StoreId::new(row.store_id),
            address,
            shipping_rate_id: row.shipping_rate_id.map(ShippingRateId::new),
        })
    }
}

/// Repository for shopper carts.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find the cart for a session token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn find(
        &self,
        store_id: StoreId,
        token: &str,
    ) -> Result<Option<CartRecord>, RepositoryError> {
        let row: Option<CartRow> = sqlx::query_as(&format!(
            "SELECT {CART_COLUMNS} FROM commerce.cart WHERE store_id = $1 AND session_id = $2"
        ))
        .bind(store_id)
        .bind(token)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Find or create the cart for a session token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn find_or_create(
        &self,
        store_id: StoreId,
        token: &str,
    ) -> Result<CartRecord, RepositoryError> {
        let row: CartRow = sqlx::query_as(&format!(
            r"
            INSERT INTO commerce.cart (store_id, session_id)
            VALUES ($1, $2)
            ON CONFLICT (store_id, session_id) DO UPDATE SET updated_at = NOW()
            RETURNING {CART_COLUMNS}
            "
        ))
        .bind(store_id)
        .bind(token)
        .fetch_one(self.pool)
        .await?;
        row.try_into()
    }

    /// Lines of a cart in the order they were added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn lines(&self, cart_id: CartId) -> Result<Vec<(ProductId, i32)>, RepositoryError> {
        let rows: Vec<(i32, i32)> = sqlx::query_as(
            "SELECT product_id, quantity FROM commerce.cart_item WHERE cart_id = $1 ORDER BY id",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(product_id, quantity)| (ProductId::new(product_id), quantity))
            .collect())
    }

    /// Change one line under a lock on the cart row.
    ///
    /// `resolve` receives the line's current quantity (`None` when absent)
    /// and returns the new one, `None` removing the line. Concurrent writers
    /// to the same cart queue on the lock, so every change sees the result
    /// of the one before it.
    ///
    /// # Errors
    ///
    /// Returns whatever `resolve` rejects with, or a repository error if a
    /// query fails. Nothing is written on error.
    pub async fn update_line<F, E>(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        resolve: F,
    ) -> Result<Option<i32>, E>
    where
        F: FnOnce(Option<i32>) -> Result<Option<i32>, E>,
        E: From<RepositoryError>,
    {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        sqlx::query("SELECT id FROM commerce.cart WHERE id = $1 FOR UPDATE")
            .bind(cart_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        let current: Option<(i32,)> = sqlx::query_as(
            "SELECT quantity FROM commerce.cart_item WHERE cart_id = $1 AND product_id = $2",
        )
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        let quantity = resolve(current.map(|(quantity,)| quantity))?;

        match quantity {
            Some(quantity) => {
                sqlx::query(
                    r"
                    INSERT INTO commerce.cart_item (cart_id, product_id, quantity)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (cart_id, product_id)
                    DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
                    ",
                )
                .bind(cart_id)
                .bind(product_id)
                .bind(quantity)
                .execute(&mut *tx)
                .await
                .map_err(RepositoryError::from)?;
            }
            None => {
                sqlx::query("DELETE FROM commerce.cart_item WHERE cart_id = $1 AND product_id = $2")
                    .bind(cart_id)
                    .bind(product_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(RepositoryError::from)?;
            }
        }

        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(quantity)
    }

    /// Remove lines; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    pub async fn remove_products(
        &self,
        cart_id: CartId,
        product_ids: &[ProductId],
    ) -> Result<u64, RepositoryError> {
        let ids: Vec<i32> = product_ids.iter().map(|id| id.as_i32()).collect();
        let result =
            sqlx::query("DELETE FROM commerce.cart_item WHERE cart_id = $1 AND product_id = ANY($2)")
                .bind(cart_id)
                .bind(&ids)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Remove every line and the shipping selection. The address is kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    pub async fn clear(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM commerce.cart_item WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE commerce.cart SET shipping_rate_id = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(cart_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Store the shipping destination.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    pub async fn set_address(
        &self,
        cart_id: CartId,
        address: &ShippingAddress,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE commerce.cart
            SET country_code = $2, province_code = $3, postal_code = $4, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(cart_id)
        .bind(address.country_code.as_str())
        .bind(address.province_code.as_deref())
        .bind(address.postal_code.as_deref())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Select (or with `None`, drop) a shipping rate.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the write fails.
    pub async fn set_shipping_rate(
        &self,
        cart_id: CartId,
        rate_id: Option<ShippingRateId>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE commerce.cart SET shipping_rate_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(cart_id)
        .bind(rate_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
