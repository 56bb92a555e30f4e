//! Water-intake tracking.
//!
//! Customers log what they drink; the tracker compares daily totals with a
//! goal that is either set explicitly or recommended from body weight and
//! activity level.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use thiserror::Error;

use crate::types::ActivityLevel;

pub const MIN_LOG_ML: i32 = 1;
pub const MAX_LOG_ML: i32 = 5000;
pub const MIN_GOAL_ML: i32 = 500;
pub const MAX_GOAL_ML: i32 = 10_000;
pub const DEFAULT_GOAL_ML: i32 = 2000;
pub const MAX_HISTORY_DAYS: u32 = 90;
pub const MIN_REMINDER_MINUTES: i32 = 15;
pub const MAX_REMINDER_MINUTES: i32 = 480;

const ML_PER_KG: i64 = 35;
const RECOMMENDED_MIN_ML: i64 = 1500;
const RECOMMENDED_MAX_ML: i64 = 5000;

/// Tracker validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("amount must be between {MIN_LOG_ML} and {MAX_LOG_ML} ml")]
    InvalidAmount,

    #[error("daily goal must be between {MIN_GOAL_ML} and {MAX_GOAL_ML} ml")]
    InvalidGoal,

    #[error("weight must be between 20 and 400 kg")]
    InvalidWeight,

    #[error("reminder interval must be between {MIN_REMINDER_MINUTES} and {MAX_REMINDER_MINUTES} minutes")]
    InvalidReminderInterval,

    #[error("history covers 1 to {MAX_HISTORY_DAYS} days")]
    InvalidRange,
}

/// Check a single intake entry.
///
/// # Errors
///
/// Returns [`TrackerError::InvalidAmount`] outside 1..=5000 ml.
pub fn validate_amount(amount_ml: i32) -> Result<i32, TrackerError> {
    if (MIN_LOG_ML..=MAX_LOG_ML).contains(&amount_ml) {
        Ok(amount_ml)
    } else {
        Err(TrackerError::InvalidAmount)
    }
}

/// A user's tracker preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct TrackerPreferences {
    /// Explicit goal; overrides the recommendation when set.
    pub daily_goal_ml: Option<i32>,
    pub weight_kg: Option<Decimal>,
    pub activity_level: ActivityLevel,
    pub reminders_enabled: bool,
    pub reminder_interval_minutes: i32,
}

impl Default for TrackerPreferences {
    fn default() -> Self {
        Self {
            daily_goal_ml: None,
            weight_kg: None,
            activity_level: ActivityLevel::default(),
            reminders_enabled: false,
            reminder_interval_minutes: 60,
        }
    }
}

impl TrackerPreferences {
    /// # Errors
    ///
    /// Returns the first [`TrackerError`] found.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self
            .daily_goal_ml
            .is_some_and(|goal| !(MIN_GOAL_ML..=MAX_GOAL_ML).contains(&goal))
        {
            return Err(TrackerError::InvalidGoal);
        }
        if self
            .weight_kg
            .is_some_and(|w| w < Decimal::from(20) || w > Decimal::from(400))
        {
            return Err(TrackerError::InvalidWeight);
        }
        if !(MIN_REMINDER_MINUTES..=MAX_REMINDER_MINUTES).contains(&self.reminder_interval_minutes) {
            return Err(TrackerError::InvalidReminderInterval);
        }
        Ok(())
    }

    /// The goal in effect: explicit, or recommended.
    #[must_use]
    pub fn effective_goal(&self) -> i32 {
        self.daily_goal_ml
            .unwrap_or_else(|| recommended_goal(self.weight_kg, self.activity_level))
    }
}

const fn activity_bonus(level: ActivityLevel) -> i64 {
    match level {
        ActivityLevel::Sedentary => 0,
        ActivityLevel::Light => 250,
        ActivityLevel::Moderate => 500,
        ActivityLevel::Active => 750,
        ActivityLevel::VeryActive => 1000,
    }
}

/// Recommended daily intake in ml.
///
/// 35 ml per kg plus an activity bonus, rounded to the nearest 50 ml and
/// clamped to 1500..=5000. Without a weight the default of 2000 ml applies.
#[must_use]
pub fn recommended_goal(weight_kg: Option<Decimal>, activity: ActivityLevel) -> i32 {
    let Some(weight) = weight_kg else {
        return DEFAULT_GOAL_ML;
    };

    let raw = weight * Decimal::from(ML_PER_KG) + Decimal::from(activity_bonus(activity));
    let rounded = (raw / Decimal::from(50)).round().to_i64().unwrap_or(0) * 50;
    let clamped = rounded.clamp(RECOMMENDED_MIN_ML, RECOMMENDED_MAX_ML);

    i32::try_from(clamped).unwrap_or(DEFAULT_GOAL_ML)
}

/// One day of intake measured against the goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_ml: i32,
    pub goal_ml: i32,
    pub remaining_ml: i32,
    /// Whole percent of the goal reached; may exceed 100.
    pub percent: u32,
    pub goal_met: bool,
}

impl DailySummary {
    #[must_use]
    pub fn new(date: NaiveDate, total_ml: i32, goal_ml: i32) -> Self {
        let total = total_ml.max(0);
        let goal = goal_ml.max(1);
        let percent = u32::try_from(i64::from(total) * 100 / i64::from(goal)).unwrap_or(u32::MAX);

        Self {
            date,
            total_ml: total,
            goal_ml: goal,
            remaining_ml: (goal - total).max(0),
            percent,
            goal_met: total >= goal,
        }
    }
}

/// Daily summaries for the `days` days ending `today`, oldest first.
///
/// Days with no entries in `totals` appear with a zero total.
///
/// # Errors
///
/// Returns [`TrackerError::InvalidRange`] unless `days` is 1..=90.
pub fn history(
    totals: &BTreeMap<NaiveDate, i32>,
    today: NaiveDate,
    days: u32,
    goal_ml: i32,
) -> Result<Vec<DailySummary>, TrackerError> {
    if !(1..=MAX_HISTORY_DAYS).contains(&days) {
        return Err(TrackerError::InvalidRange);
    }

    let start = today
        .checked_sub_days(Days::new(u64::from(days - 1)))
        .ok_or(TrackerError::InvalidRange)?;

    Ok(start
        .iter_days()
        .take_while(|date| *date <= today)
        .map(|date| DailySummary::new(date, totals.get(&date).copied().unwrap_or(0), goal_ml))
        .collect())
}

/// Consecutive goal-met days ending today.
///
/// A day that has not met the goal yet does not break the streak if it is
/// today; counting then starts from yesterday.
#[must_use]
pub fn streak(totals: &BTreeMap<NaiveDate, i32>, today: NaiveDate, goal_ml: i32) -> u32 {
    let met = |date: &NaiveDate| totals.get(date).is_some_and(|total| *total >= goal_ml);

    let mut day = if met(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) => yesterday,
            None => return 0,
        }
    };

    let mut count = 0;
    while met(&day) {
        count += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    count
}

/// Days of totals loaded per step of a [`StreakScan`].
pub const STREAK_WINDOW_DAYS: u32 = 90;

/// Earliest day of the streak counted by [`streak`].
fn streak_start(totals: &BTreeMap<NaiveDate, i32>, today: NaiveDate, goal_ml: i32) -> Option<NaiveDate> {
    let met = |date: &NaiveDate| totals.get(date).is_some_and(|total| *total >= goal_ml);

    let mut day = if met(&today) { today } else { today.pred_opt()? };
    if !met(&day) {
        return None;
    }
    loop {
        match day.pred_opt() {
            Some(prev) if met(&prev) => day = prev,
            _ => return Some(day),
        }
    }
}

/// Loads daily totals backwards in windows until the streak is settled.
///
/// ```ignore
/// let mut scan = StreakScan::new(today, goal);
/// while let Some((from, to)) = scan.next_window() {
///     scan.add(from, load_totals(from, to)?);
/// }
/// let days = scan.days();
/// ```
#[derive(Debug, Clone)]
pub struct StreakScan {
    today: NaiveDate,
    goal_ml: i32,
    totals: BTreeMap<NaiveDate, i32>,
    loaded_from: Option<NaiveDate>,
}

impl StreakScan {
    #[must_use]
    pub const fn new(today: NaiveDate, goal_ml: i32) -> Self {
        Self {
            today,
            goal_ml,
            totals: BTreeMap::new(),
            loaded_from: None,
        }
    }

    /// The next inclusive date range to load, or `None` once the streak
    /// ends inside what is already loaded.
    #[must_use]
    pub fn next_window(&self) -> Option<(NaiveDate, NaiveDate)> {
        let span = Days::new(u64::from(STREAK_WINDOW_DAYS - 1));
        let to = match self.loaded_from {
            None => self.today,
            Some(from) => {
                if streak_start(&self.totals, self.today, self.goal_ml)? != from {
                    return None;
                }
                from.pred_opt()?
            }
        };
        Some((to.checked_sub_days(span)?, to))
    }

    /// Record the totals loaded for the window starting at `from`.
    pub fn add(&mut self, from: NaiveDate, totals: BTreeMap<NaiveDate, i32>) {
        self.totals.extend(totals);
        self.loaded_from = Some(from);
    }

    #[must_use]
    pub fn days(&self) -> u32 {
        streak(&self.totals, self.today, self.goal_ml)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_recommended_goal() {
        assert_eq!(recommended_goal(None, ActivityLevel::VeryActive), 2000);
        assert_eq!(
            recommended_goal(Some(Decimal::from(70)), ActivityLevel::Moderate),
            2950
        );
        // 63 * 35 = 2205 -> 2200
        assert_eq!(
            recommended_goal(Some(Decimal::from(63)), ActivityLevel::Sedentary),
            2200
        );
        assert_eq!(
            recommended_goal(Some(Decimal::from(30)), ActivityLevel::Sedentary),
            1500
        );
        assert_eq!(
            recommended_goal(Some(Decimal::from(150)), ActivityLevel::VeryActive),
            5000
        );
    }

    #[test]
    fn test_explicit_goal_overrides() {
        let prefs = TrackerPreferences {
            daily_goal_ml: Some(3200),
            weight_kg: Some(Decimal::from(70)),
            ..TrackerPreferences::default()
        };
        assert_eq!(prefs.effective_goal(), 3200);
    }

    #[test]
    fn test_preferences_validation() {
        let mut prefs = TrackerPreferences::default();
        assert!(prefs.validate().is_ok());
        prefs.reminder_interval_minutes = 10;
        assert_eq!(prefs.validate(), Err(TrackerError::InvalidReminderInterval));
        prefs.reminder_interval_minutes = 60;
        prefs.daily_goal_ml = Some(400);
        assert_eq!(prefs.validate(), Err(TrackerError::InvalidGoal));
    }

    #[test]
    fn test_amount_bounds() {
        assert!(validate_amount(0).is_err());
        assert!(validate_amount(5001).is_err());
        assert_eq!(validate_amount(250).unwrap(), 250);
    }

    #[test]
    fn test_summary() {
        let s = DailySummary::new(date(2024, 5, 1), 1500, 2000);
        assert_eq!(s.remaining_ml, 500);
        assert_eq!(s.percent, 75);
        assert!(!s.goal_met);

        let s = DailySummary::new(date(2024, 5, 1), 2500, 2000);
        assert_eq!(s.remaining_ml, 0);
        assert_eq!(s.percent, 125);
        assert!(s.goal_met);
    }

    #[test]
    fn test_history_zero_fills() {
        let today = date(2024, 3, 2);
        let totals = BTreeMap::from([(date(2024, 2, 29), 1000)]);
        let days = history(&totals, today, 4, 2000).unwrap();
        assert_eq!(days.len(), 4);
        assert_eq!(days[0].date, date(2024, 2, 28));
        assert_eq!(days[1].total_ml, 1000);
        assert_eq!(days[3].date, today);
        assert_eq!(days[3].total_ml, 0);

        assert_eq!(history(&totals, today, 0, 2000), Err(TrackerError::InvalidRange));
        assert_eq!(history(&totals, today, 91, 2000), Err(TrackerError::InvalidRange));
    }

    #[test]
    fn test_streak_tolerates_unfinished_today() {
        let today = date(2024, 6, 10);
        let totals = BTreeMap::from([
            (date(2024, 6, 7), 2000),
            (date(2024, 6, 8), 2100),
            (date(2024, 6, 9), 2500),
            (today, 300),
        ]);
        assert_eq!(streak(&totals, today, 2000), 3);

        let mut totals = totals;
        totals.insert(today, 2000);
        assert_eq!(streak(&totals, today, 2000), 4);

        totals.remove(&date(2024, 6, 9));
        assert_eq!(streak(&totals, today, 2000), 1);
    }

    fn scan_over(days_met: &BTreeMap<NaiveDate, i32>, today: NaiveDate, goal: i32) -> (u32, usize) {
        let mut scan = StreakScan::new(today, goal);
        let mut loads = 0;
        while let Some((from, to)) = scan.next_window() {
            loads += 1;
            let window = days_met
                .range(from..=to)
                .map(|(day, total)| (*day, *total))
                .collect();
            scan.add(from, window);
        }
        (scan.days(), loads)
    }

    #[test]
    fn test_streak_scan_runs_past_one_window() {
        let today = date(2024, 6, 10);
        let first = today.checked_sub_days(Days::new(199)).unwrap();
        let totals: BTreeMap<_, _> = first.iter_days().take(200).map(|day| (day, 2500)).collect();

        let (days, loads) = scan_over(&totals, today, 2000);
        assert_eq!(days, 200);
        assert_eq!(loads, 3);
    }

    #[test]
    fn test_streak_scan_stops_at_first_gap() {
        let today = date(2024, 6, 10);
        let mut totals: BTreeMap<_, _> = today
            .checked_sub_days(Days::new(149))
            .unwrap()
            .iter_days()
            .take(150)
            .map(|day| (day, 2500))
            .collect();
        totals.insert(today.checked_sub_days(Days::new(120)).unwrap(), 100);
        totals.insert(today, 50);

        let (days, loads) = scan_over(&totals, today, 2000);
        assert_eq!(days, 119);
        assert_eq!(loads, 2);
    }

    #[test]
    fn test_streak_scan_without_streak_loads_once() {
        let today = date(2024, 6, 10);
        let (days, loads) = scan_over(&BTreeMap::new(), today, 2000);
        assert_eq!(days, 0);
        assert_eq!(loads, 1);
    }
}
