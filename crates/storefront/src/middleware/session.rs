//! Session middleware configuration.
//!
//! Sessions are stored in `PostgreSQL` (`tower_sessions.session`) and carry
//! only the logged-in [`CurrentUser`](crate::models::CurrentUser).

use sqlx::PgPool;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "ws_session";

/// Sessions expire after 7 days without a request.
const SESSION_INACTIVITY_DAYS: i64 = 7;

/// Create the session layer over a `PostgreSQL` store.
///
/// The store's table is created by `ws-cli migrate`.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(SESSION_INACTIVITY_DAYS)))
        .with_secure(config.is_secure())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
