//! Store bootstrap command.
//!
//! ```bash
//! tillbox store create --name "Harbor Goods" --slug harbor-goods --currency EUR
//! ```

use tillbox_admin::db::StoreRepository;
use tillbox_admin::models::store::CreateStoreInput;
use tillbox_core::CurrencyCode;
use tillbox_core::catalog::Store;

use super::{CommandError, connect};

/// Create a store.
///
/// # Errors
///
/// Returns `CommandError` for invalid input, a taken slug, or a database failure.
pub async fn create(
    name: &str,
    slug: &str,
    currency: CurrencyCode,
    email: Option<&str>,
) -> Result<Store, CommandError> {
    let fields = CreateStoreInput {
        name: name.to_owned(),
        slug: Some(slug.to_owned()),
        currency,
        contact_email: email.map(str::to_owned),
    }
    .validate()?;

    let pool = connect().await?;
    let store = StoreRepository::new(&pool).create(&fields).await?;

    tracing::info!("Store created successfully!");
    tracing::info!("  ID: {}", store.id);
    tracing::info!("  Slug: {}", store.slug);
    tracing::info!("  Currency: {}", store.currency);
    Ok(store)
}
