//! Short-lived caches for data every storefront request needs.
//!
//! Store lookups (by slug) and each store's discount list are cached with
//! `moka` for `STOREFRONT_CATALOG_CACHE_TTL_SECS`. Misses are not cached, so a
//! store created through the admin API is visible on the next request.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use tillbox_core::catalog::Store;
use tillbox_core::pricing::Discount;
use tillbox_core::{Slug, StoreId};

use crate::db::{CatalogRepository, RepositoryError};

const MAX_CACHED_STORES: u64 = 1_000;

/// Caches shared by all handlers.
#[derive(Clone)]
pub struct CatalogCache {
    stores: Cache<String, Store>,
    discounts: Cache<StoreId, Arc<Vec<Discount>>>,
}

impl CatalogCache {
    /// Create empty caches whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            stores: Cache::builder()
                .max_capacity(MAX_CACHED_STORES)
                .time_to_live(ttl)
                .build(),
            discounts: Cache::builder()
                .max_capacity(MAX_CACHED_STORES)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Look up a store by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store is not cached and the query fails.
    pub async fn store(&self, pool: &PgPool, slug: &Slug) -> Result<Option<Store>, RepositoryError> {
        if let Some(store) = self.stores.get(slug.as_str()).await {
            debug!(slug = %slug, "Cache hit for store");
            return Ok(Some(store));
        }

        let store = CatalogRepository::new(pool).store_by_slug(slug).await?;
        if let Some(store) = &store {
            self.stores.insert(slug.as_str().to_owned(), store.clone()).await;
        }
        Ok(store)
    }

    /// Discounts that may apply to a store's products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the list is not cached and the query fails.
    pub async fn discounts(
        &self,
        pool: &PgPool,
        store_id: StoreId,
    ) -> Result<Arc<Vec<Discount>>, RepositoryError> {
        if let Some(discounts) = self.discounts.get(&store_id).await {
            debug!(store_id = %store_id, "Cache hit for discounts");
            return Ok(discounts);
        }

        let discounts = Arc::new(CatalogRepository::new(pool).current_discounts(store_id).await?);
        self.discounts.insert(store_id, Arc::clone(&discounts)).await;
        Ok(discounts)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::postgres::PgPoolOptions;
    use tillbox_core::CurrencyCode;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://tillbox@localhost/never_connected")
            .unwrap()
    }

    fn store() -> Store {
        Store {
            id: StoreId::new(7),
            name: "Harbor Goods".to_owned(),
            slug: Slug::parse("harbor-goods").unwrap(),
            currency: CurrencyCode::USD,
            contact_email: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_cached_entries_skip_the_database() {
        let cache = CatalogCache::new(Duration::from_secs(60));
        let pool = lazy_pool();
        let store = store();

        cache.stores.insert("harbor-goods".to_owned(), store.clone()).await;
        cache.discounts.insert(store.id, Arc::new(Vec::new())).await;

        let found = cache.store(&pool, &store.slug).await.unwrap().unwrap();
        assert_eq!(found.id, store.id);
        assert!(cache.discounts(&pool, store.id).await.unwrap().is_empty());
    }
}
