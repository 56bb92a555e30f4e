//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! ws-cli migrate
//! ```
//!
//! Applies `crates/storefront/migrations/` and creates the session store
//! table (`tower_sessions.session`). Both steps are idempotent.

use tower_sessions_sqlx_store::PostgresStore;

use super::{CommandError, connect};

/// Run application and session store migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running marketplace migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Running session store migration...");
    PostgresStore::new(pool.clone())
        .migrate()
        .await
        .map_err(|e| CommandError::SessionStore(e.to_string()))?;

    tracing::info!("Migrations complete!");
    Ok(())
}
