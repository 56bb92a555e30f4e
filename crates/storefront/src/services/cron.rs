//! Periodic cleanup.
//!
//! Triggered by `POST /api/cron/cleanup` or `ws-cli cleanup`. Each step is
//! independent; one order or subscription failing does not stop the rest.

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::{OrderRepository, PromoCodeRepository, SubscriptionRepository, TrackerRepository};
use crate::error::Result;
use crate::services::orders::OrderService;
use crate::services::subscriptions::{DueOutcome, SubscriptionService};
use crate::state::AppState;

/// Tracker entries older than this are deleted.
pub const TRACKER_RETENTION_DAYS: i64 = 400;

/// Counts from one cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub cancelled_orders: u64,
    pub expired_promo_codes: u64,
    pub purged_tracker_logs: u64,
    pub subscription_orders: u64,
    pub skipped_subscriptions: u64,
}

/// Run every cleanup step.
///
/// # Errors
///
/// Returns an error if a step's listing query fails.
pub async fn run_cleanup(state: &AppState) -> Result<CleanupReport> {
    let pool = state.pool();
    let settings = state.settings().get(pool).await?;
    let now = Utc::now();
    let mut report = CleanupReport::default();

    // 1. Unpaid card orders past their payment window
    let cutoff = now - Duration::hours(i64::from(settings.pending_order_ttl_hours));
    let orders = OrderService::new(state);
    for order_id in OrderRepository::new(pool).stale_card_orders(cutoff).await? {
        match orders.cancel_unpaid(order_id).await {
            Ok(_) => report.cancelled_orders += 1,
            Err(e) => warn!(order_id = %order_id, error = %e, "Could not cancel stale order"),
        }
    }

    // 2. Expired promo codes
    report.expired_promo_codes = PromoCodeRepository::new(pool).deactivate_expired(now).await?;

    // 3. Old tracker entries
    report.purged_tracker_logs = TrackerRepository::new(pool)
        .purge_before(now - Duration::days(TRACKER_RETENTION_DAYS))
        .await?;

    // 4. Due subscriptions, held back while the store is closed
    if settings.maintenance_mode {
        info!("Maintenance mode, leaving subscriptions for the next run");
    } else {
        let today = now.date_naive();
        let subscriptions = SubscriptionService::new(state);
        for id in SubscriptionRepository::new(pool).due(today).await? {
            match subscriptions.process_due(id, today).await {
                Ok(DueOutcome::Ordered(_)) => report.subscription_orders += 1,
                Ok(DueOutcome::Skipped) => report.skipped_subscriptions += 1,
                Ok(DueOutcome::NotDue) => {}
                Err(e) => warn!(subscription_id = %id, error = %e, "Could not process subscription"),
            }
        }
    }

    info!(?report, "Cleanup finished");
    Ok(report)
}
