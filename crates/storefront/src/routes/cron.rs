//! Scheduled jobs triggered by an external scheduler.

use axum::{Json, extract::State};

use crate::error::Result;
use crate::middleware::CronAuth;
use crate::services::cron::{CleanupReport, run_cleanup};
use crate::state::AppState;

/// `POST /api/cron/cleanup`
///
/// # Errors
///
/// Returns 401 without the cron bearer token and 500 if a step fails.
pub async fn cleanup(State(state): State<AppState>, _auth: CronAuth) -> Result<Json<CleanupReport>> {
    Ok(Json(run_cleanup(&state).await?))
}
