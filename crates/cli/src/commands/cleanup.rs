//! One-off run of the scheduled cleanup job.
//!
//! # Usage
//!
//! ```bash
//! ws-cli cleanup
//! ```
//!
//! Runs exactly what `POST /api/cron/cleanup` runs, so it needs the full
//! storefront configuration (payment gateway for refunds, SMTP for email).

use wellspring_storefront::config::StorefrontConfig;
use wellspring_storefront::db;
use wellspring_storefront::services::cron::run_cleanup;
use wellspring_storefront::state::AppState;

use super::CommandError;

/// Run the cleanup job once and log its counts.
///
/// # Errors
///
/// Returns an error if configuration is incomplete or a step fails.
pub async fn run() -> Result<(), CommandError> {
    let config = StorefrontConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    let state = AppState::new(config, pool)?;

    let report = run_cleanup(&state).await?;
    tracing::info!(
        cancelled_orders = report.cancelled_orders,
        expired_promo_codes = report.expired_promo_codes,
        purged_tracker_logs = report.purged_tracker_logs,
        subscription_orders = report.subscription_orders,
        skipped_subscriptions = report.skipped_subscriptions,
        "Cleanup complete"
    );
    Ok(())
}
