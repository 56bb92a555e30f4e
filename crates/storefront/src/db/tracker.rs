//! Water-intake tracker storage.
//!
//! Days are UTC calendar days.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;

use wellspring_core::tracker::TrackerPreferences;
use wellspring_core::{ActivityLevel, TrackerLogId, UserId};

use super::RepositoryError;

/// One intake entry.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TrackerLog {
    pub id: TrackerLogId,
    pub amount_ml: i32,
    pub logged_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PreferencesRow {
    daily_goal_ml: Option<i32>,
    weight_kg: Option<rust_decimal::Decimal>,
    activity_level: ActivityLevel,
    reminders_enabled: bool,
    reminder_interval_minutes: i32,
}

impl From<PreferencesRow> for TrackerPreferences {
    fn from(row: PreferencesRow) -> Self {
        Self {
            daily_goal_ml: row.daily_goal_ml,
            weight_kg: row.weight_kg,
            activity_level: row.activity_level,
            reminders_enabled: row.reminders_enabled,
            reminder_interval_minutes: row.reminder_interval_minutes,
        }
    }
}

/// Repository for tracker database operations.
pub struct TrackerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TrackerRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's preferences, or the defaults if they never saved any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn preferences(&self, user_id: UserId) -> Result<TrackerPreferences, RepositoryError> {
        let row = sqlx::query_as::<_, PreferencesRow>(
            r"
            SELECT daily_goal_ml, weight_kg, activity_level, reminders_enabled,
                   reminder_interval_minutes
            FROM market.tracker_settings
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(TrackerPreferences::from).unwrap_or_default())
    }

    /// Save validated preferences.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save_preferences(
        &self,
        user_id: UserId,
        prefs: &TrackerPreferences,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO market.tracker_settings
                (user_id, daily_goal_ml, weight_kg, activity_level, reminders_enabled,
                 reminder_interval_minutes)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE
            SET daily_goal_ml = EXCLUDED.daily_goal_ml,
                weight_kg = EXCLUDED.weight_kg,
                activity_level = EXCLUDED.activity_level,
                reminders_enabled = EXCLUDED.reminders_enabled,
                reminder_interval_minutes = EXCLUDED.reminder_interval_minutes,
                updated_at = NOW()
            ",
        )
        .bind(user_id)
        .bind(prefs.daily_goal_ml)
        .bind(prefs.weight_kg)
        .bind(prefs.activity_level)
        .bind(prefs.reminders_enabled)
        .bind(prefs.reminder_interval_minutes)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Record an intake entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add_log(
        &self,
        user_id: UserId,
        amount_ml: i32,
        logged_at: DateTime<Utc>,
    ) -> Result<TrackerLog, RepositoryError> {
        let log = sqlx::query_as::<_, TrackerLog>(
            r"
            INSERT INTO market.tracker_logs (user_id, amount_ml, logged_at)
            VALUES ($1, $2, $3)
            RETURNING id, amount_ml, logged_at
            ",
        )
        .bind(user_id)
        .bind(amount_ml)
        .bind(logged_at)
        .fetch_one(self.pool)
        .await?;

        Ok(log)
    }

    /// Delete one of the user's entries.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if missing or owned by someone else.
    pub async fn delete_log(&self, user_id: UserId, id: TrackerLogId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM market.tracker_logs WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Entries logged on one day, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn logs_on(&self, user_id: UserId, date: NaiveDate) -> Result<Vec<TrackerLog>, RepositoryError> {
        let logs = sqlx::query_as::<_, TrackerLog>(
            r"
            SELECT id, amount_ml, logged_at FROM market.tracker_logs
            WHERE user_id = $1 AND (logged_at AT TIME ZONE 'UTC')::date = $2
            ORDER BY logged_at
            ",
        )
        .bind(user_id)
        .bind(date)
        .fetch_all(self.pool)
        .await?;

        Ok(logs)
    }

    /// Daily totals for `from..=to`. Days without entries are absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn daily_totals(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, i32>, RepositoryError> {
        let rows = sqlx::query_as::<_, (NaiveDate, i64)>(
            r"
            SELECT (logged_at AT TIME ZONE 'UTC')::date AS day, SUM(amount_ml)::bigint
            FROM market.tracker_logs
            WHERE user_id = $1 AND (logged_at AT TIME ZONE 'UTC')::date BETWEEN $2 AND $3
            GROUP BY day
            ",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(day, total)| (day, i32::try_from(total).unwrap_or(i32::MAX)))
            .collect())
    }

    /// Delete entries logged before `cutoff`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM market.tracker_logs WHERE logged_at < $1")
            .bind(cutoff)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
