//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! ws-cli admin create -e admin@example.com -n "Admin Name" -p 'long passphrase'
//! ```
//!
//! Creating an admin for an email that already has an account promotes that
//! account and replaces its password.

use wellspring_core::UserId;
use wellspring_storefront::services::auth::AuthService;

use super::{CommandError, connect};

/// Create an admin user, or promote an existing one.
///
/// # Errors
///
/// Returns an error for an invalid email or weak password, or if the
/// database is unreachable.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<UserId, CommandError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CommandError::InvalidInput("name cannot be empty".to_owned()));
    }

    let pool = connect().await?;

    tracing::info!("Creating admin user: {}", email);
    let user = AuthService::new(&pool).ensure_admin(email, name, password).await?;

    tracing::info!(
        "Admin user ready! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(user.id)
}
