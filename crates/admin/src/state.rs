//! Application state shared across handlers.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use sqlx::PgPool;

use secrecy::ExposeSecret;

use crate::config::AdminConfig;

/// Application state shared across all handlers.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    api_token_digest: [u8; 32],
}

impl AppState {
    /// Build state from loaded configuration and a pool.
    #[must_use]
    pub fn new(config: AdminConfig, pool: PgPool) -> Self {
        let api_token_digest = Sha256::digest(config.api_token.expose_secret().as_bytes()).into();
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                api_token_digest,
            }),
        }
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Get a reference to the database pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// SHA-256 of the configured API token.
    #[must_use]
    pub fn api_token_digest(&self) -> &[u8; 32] {
        &self.inner.api_token_digest
    }
}
