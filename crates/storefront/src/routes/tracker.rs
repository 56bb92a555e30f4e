//! Water-intake tracker.
//!
//! Days are UTC calendar days. The goal used for summaries is the user's
//! explicit goal, or the recommendation from their weight and activity.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use wellspring_core::TrackerLogId;
use wellspring_core::tracker::{
    DailySummary, MAX_HISTORY_DAYS, StreakScan, TrackerError, TrackerPreferences, history,
    validate_amount,
};

use crate::db::TrackerRepository;
use crate::db::tracker::TrackerLog;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

const DEFAULT_HISTORY_DAYS: u32 = 7;

/// Preferences with the goal they resolve to.
#[derive(Debug, Serialize)]
pub struct SettingsView {
    #[serde(flatten)]
    pub preferences: TrackerPreferences,
    pub effective_goal_ml: i32,
}

impl From<TrackerPreferences> for SettingsView {
    fn from(preferences: TrackerPreferences) -> Self {
        let effective_goal_ml = preferences.effective_goal();
        Self {
            preferences,
            effective_goal_ml,
        }
    }
}

/// New intake entry.
#[derive(Debug, Deserialize)]
pub struct LogRequest {
    pub amount_ml: i32,
    /// Defaults to now. Future times are rejected.
    pub logged_at: Option<DateTime<Utc>>,
}

/// `?date=`, defaulting to today.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub date: Option<NaiveDate>,
}

/// One day with its entries and the current streak.
#[derive(Debug, Serialize)]
pub struct SummaryView {
    #[serde(flatten)]
    pub summary: DailySummary,
    pub logs: Vec<TrackerLog>,
    pub streak_days: u32,
}

/// `?days=`, 1 to 90.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<u32>,
}

/// `GET /api/tracker/settings`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn get_settings(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<SettingsView>> {
    let prefs = TrackerRepository::new(state.pool()).preferences(user.id).await?;
    Ok(Json(prefs.into()))
}

/// `PUT /api/tracker/settings`
///
/// # Errors
///
/// Returns 400 for out-of-range values.
pub async fn update_settings(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(prefs): Json<TrackerPreferences>,
) -> Result<Json<SettingsView>> {
    prefs.validate()?;
    TrackerRepository::new(state.pool())
        .save_preferences(user.id, &prefs)
        .await?;
    Ok(Json(prefs.into()))
}

/// `POST /api/tracker/logs`
///
/// # Errors
///
/// Returns 400 for an invalid amount or a time in the future.
pub async fn add_log(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<LogRequest>,
) -> Result<(StatusCode, Json<TrackerLog>)> {
    let amount = validate_amount(body.amount_ml)?;
    let now = Utc::now();
    let logged_at = body.logged_at.unwrap_or(now);
    if logged_at > now {
        return Err(AppError::BadRequest("logged_at cannot be in the future".to_owned()));
    }

    let log = TrackerRepository::new(state.pool())
        .add_log(user.id, amount, logged_at)
        .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

/// `DELETE /api/tracker/logs/{id}`
///
/// # Errors
///
/// Returns 404 if the entry is not the user's.
pub async fn delete_log(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<TrackerLogId>,
) -> Result<StatusCode> {
    TrackerRepository::new(state.pool())
        .delete_log(user.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/tracker/summary`
///
/// # Errors
///
/// Returns 500 if a query fails.
pub async fn summary(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryView>> {
    let today = Utc::now().date_naive();
    let date = query.date.unwrap_or(today);

    let repo = TrackerRepository::new(state.pool());
    let goal = repo.preferences(user.id).await?.effective_goal();
    let logs = repo.logs_on(user.id, date).await?;
    let total = day_total(&logs);

    let mut scan = StreakScan::new(today, goal);
    while let Some((from, to)) = scan.next_window() {
        scan.add(from, repo.daily_totals(user.id, from, to).await?);
    }

    Ok(Json(SummaryView {
        summary: DailySummary::new(date, total, goal),
        logs,
        streak_days: scan.days(),
    }))
}

/// Sum of a day's entries, saturating at `i32::MAX`.
fn day_total(logs: &[TrackerLog]) -> i32 {
    logs.iter()
        .fold(0_i32, |sum, log| sum.saturating_add(log.amount_ml))
}

/// `GET /api/tracker/history`
///
/// # Errors
///
/// Returns 400 unless `days` is 1 to 90.
pub async fn history_view(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<DailySummary>>> {
    let days = query.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    let today = Utc::now().date_naive();

    if !(1..=MAX_HISTORY_DAYS).contains(&days) {
        return Err(TrackerError::InvalidRange.into());
    }

    let repo = TrackerRepository::new(state.pool());
    let goal = repo.preferences(user.id).await?.effective_goal();

    let from = today
        .checked_sub_days(Days::new(u64::from(days - 1)))
        .unwrap_or(today);
    let totals = repo.daily_totals(user.id, from, today).await?;
    Ok(Json(history(&totals, today, days, goal)?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_view_flattens_preferences() {
        let view = SettingsView::from(TrackerPreferences {
            daily_goal_ml: Some(2500),
            ..TrackerPreferences::default()
        });
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["daily_goal_ml"], 2500);
        assert_eq!(json["effective_goal_ml"], 2500);
        assert_eq!(json["reminder_interval_minutes"], 60);
    }

    #[test]
    fn test_log_request_time_is_optional() {
        let body: LogRequest = serde_json::from_str(r#"{"amount_ml": 250}"#).unwrap();
        assert_eq!(body.amount_ml, 250);
        assert!(body.logged_at.is_none());
    }

    #[test]
    fn test_day_total_saturates() {
        let log = |amount_ml| TrackerLog {
            id: TrackerLogId::new(1),
            amount_ml,
            logged_at: Utc::now(),
        };
        assert_eq!(day_total(&[log(250), log(500)]), 750);
        assert_eq!(day_total(&[]), 0);

        let many = vec![log(5000); 500_000];
        assert_eq!(day_total(&many), i32::MAX);
    }
}
