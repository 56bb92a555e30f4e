//! CLI subcommands.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `cleanup` also needs the full storefront configuration

pub mod admin;
pub mod cleanup;
pub mod migrate;
pub mod settings;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use wellspring_storefront::config::ConfigError;
use wellspring_storefront::db::{self, RepositoryError};
use wellspring_storefront::error::AppError;
use wellspring_storefront::services::auth::AuthError;
use wellspring_storefront::state::StateError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session store migration error: {0}")]
    SessionStore(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    State(#[from] StateError),

    #[error("{0}")]
    App(#[from] AppError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connect to the marketplace database.
async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CommandError::MissingEnvVar("STOREFRONT_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&SecretString::from(database_url)).await?)
}
