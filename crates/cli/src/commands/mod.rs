//! Subcommand implementations.

pub mod migrate;
pub mod quote;
pub mod seed;
pub mod store;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use tillbox_admin::db::{self, RepositoryError};
use tillbox_core::validation::ValidationError;

/// Errors shared by the data commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Repository(#[from] RepositoryError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
}

/// Connect using `DATABASE_URL`.
pub(crate) async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}
