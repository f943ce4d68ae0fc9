//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use tillbox_core::Slug;
use tillbox_core::catalog::Store;

use crate::cache::CatalogCache;
use crate::config::StorefrontConfig;
use crate::error::{AppError, Result};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    cache: CatalogCache,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let cache = CatalogCache::new(config.catalog_cache_ttl);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                cache,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the store and discount caches.
    #[must_use]
    pub fn cache(&self) -> &CatalogCache {
        &self.inner.cache
    }

    /// Resolve the store named in a request path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown or malformed slug.
    pub async fn store(&self, slug: &str) -> Result<Store> {
        let not_found = || AppError::NotFound(format!("store {slug}"));
        let slug = Slug::parse(slug).map_err(|_| not_found())?;
        self.cache()
            .store(self.pool(), &slug)
            .await?
            .ok_or_else(not_found)
    }
}
