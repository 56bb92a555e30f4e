//! Database access for the marketplace.
//!
//! # Schema: `market`
//!
//! ## Tables
//!
//! - `users`, `vendors` - Accounts and seller profiles
//! - `brands`, `products` - Catalog owned by vendors
//! - `addresses` - Delivery addresses (one default per user)
//! - `orders`, `order_items` - Orders with per-vendor item lines
//! - `promo_codes`, `reviews`, `subscriptions`
//! - `tracker_settings`, `tracker_logs` - Water-intake tracking
//! - `payouts` - Vendor payout requests
//! - `settings` - Runtime store settings (JSON)
//!
//! Sessions live in `tower_sessions.session`, managed by the session store.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p wellspring-cli -- migrate
//! ```

pub mod addresses;
pub mod catalog;
pub mod orders;
pub mod payouts;
pub mod promo_codes;
pub mod reviews;
pub mod settings;
pub mod subscriptions;
pub mod tracker;
pub mod users;
pub mod vendors;

use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use thiserror::Error;

pub use addresses::AddressRepository;
pub use catalog::CatalogRepository;
pub use orders::OrderRepository;
pub use payouts::PayoutRepository;
pub use promo_codes::PromoCodeRepository;
pub use reviews::ReviewRepository;
pub use settings::SettingsRepository;
pub use subscriptions::SubscriptionRepository;
pub use tracker::TrackerRepository;
pub use users::UserRepository;
pub use vendors::VendorRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique violation to [`RepositoryError::Conflict`], anything else to `Database`.
    pub(crate) fn unique(message: &str) -> impl FnOnce(sqlx::Error) -> Self + '_ {
        move |e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return Self::Conflict(message.to_owned());
            }
            Self::Database(e)
        }
    }

    /// Map a foreign key violation to `Conflict`, leaving other errors as they are.
    pub(crate) fn referenced(message: &str) -> impl FnOnce(sqlx::Error) -> Self + '_ {
        move |e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return Self::Conflict(message.to_owned());
            }
            Self::Database(e)
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// Every connection gets `search_path = market, public` so enum types
/// resolve without a schema prefix.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is malformed or the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options(database_url)?)
        .await
}

/// Create a pool that connects on first use. Used by tests and tooling that
/// may never touch the database.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is malformed.
pub fn create_lazy_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    Ok(PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy_with(connect_options(database_url)?))
}

fn connect_options(database_url: &SecretString) -> Result<PgConnectOptions, sqlx::Error> {
    Ok(PgConnectOptions::from_str(database_url.expose_secret())?
        .options([("search_path", "market,public")]))
}

