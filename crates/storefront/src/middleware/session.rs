//! Session middleware configuration and the shopper's cart token.
//!
//! Sessions are stored in `PostgreSQL` (`tower-sessions-sqlx-store`) and the
//! cookie is signed with a key
//! derived from `STOREFRONT_SESSION_SECRET`. The session only holds an opaque
//! cart token; carts themselves live in `commerce.cart`.

use secrecy::ExposeSecret;
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, Session, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;
use uuid::Uuid;

use crate::config::StorefrontConfig;
use crate::error::Result;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "tillbox_session";

/// Session key holding the cart token.
pub const CART_TOKEN_KEY: &str = "cart_token";

/// Session expiry time in seconds (30 days of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 30 * 24 * 60 * 60;

/// The production session store.
///
/// Its `tower_sessions.session` table is created by `tillbox migrate`.
#[must_use]
pub fn postgres_store(pool: &PgPool) -> PostgresStore {
    PostgresStore::new(pool.clone())
}

/// Create the signed session layer over `store`.
#[must_use]
pub fn create_session_layer<S: SessionStore + Clone>(
    store: S,
    config: &StorefrontConfig,
) -> SessionManagerLayer<S, SignedCookie> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_https())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(config.session_secret.expose_secret()))
}

/// Stretch the configured secret to the 64 bytes `Key` requires.
fn signing_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// The cart token of this session, if a cart was ever written.
///
/// # Errors
///
/// Returns `AppError::Session` if the session store fails.
pub async fn cart_token(session: &Session) -> Result<Option<Uuid>> {
    Ok(session.get::<Uuid>(CART_TOKEN_KEY).await?)
}

/// The cart token of this session, minting one on first use.
///
/// # Errors
///
/// Returns `AppError::Session` if the session store fails.
pub async fn ensure_cart_token(session: &Session) -> Result<Uuid> {
    if let Some(token) = cart_token(session).await? {
        return Ok(token);
    }
    let token = Uuid::new_v4();
    session.insert(CART_TOKEN_KEY, token).await?;
    tracing::debug!("Minted cart token for new session");
    Ok(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    #[test]
    fn test_signing_key_is_deterministic() {
        let a = signing_key("kP9#vR2$mX7!qL4@nB8&wT1*zC5^hJ3%");
        let b = signing_key("kP9#vR2$mX7!qL4@nB8&wT1*zC5^hJ3%");
        let c = signing_key("a-different-secret-of-enough-length");
        assert_eq!(a.master(), b.master());
        assert_ne!(a.master(), c.master());
    }

    #[tokio::test]
    async fn test_cart_token_minted_once() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        assert_eq!(cart_token(&session).await.unwrap(), None);
        let first = ensure_cart_token(&session).await.unwrap();
        let second = ensure_cart_token(&session).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cart_token(&session).await.unwrap(), Some(first));
    }
}
