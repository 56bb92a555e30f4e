//! Recurring delivery subscriptions.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Deserialize;
use thiserror::Error;

use crate::types::{SubscriptionFrequency, SubscriptionStatus};

/// Subscription rule violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("quantity must be between 1 and {0}")]
    InvalidQuantity(u32),

    #[error("first delivery date must be in the future")]
    StartNotInFuture,

    #[error("cannot {action} a {status} subscription")]
    InvalidTransition {
        action: SubscriptionAction,
        status: SubscriptionStatus,
    },

    #[error("delivery date is out of range")]
    DateOutOfRange,
}

/// Customer-initiated status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionAction {
    Pause,
    Resume,
    Cancel,
}

impl std::fmt::Display for SubscriptionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Cancel => "cancel",
        })
    }
}

impl SubscriptionFrequency {
    /// The delivery date following `date`.
    ///
    /// Monthly subscriptions land on `anchor_day`, clamped to the last day
    /// of shorter months, so a subscription started on the 31st returns to
    /// the 31st after February.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::DateOutOfRange`] past the calendar's end.
    pub fn advance(self, date: NaiveDate, anchor_day: u32) -> Result<NaiveDate, SubscriptionError> {
        let next = match self {
            Self::Weekly => date.checked_add_days(Days::new(7)),
            Self::Biweekly => date.checked_add_days(Days::new(14)),
            Self::Monthly => date
                .with_day(1)
                .and_then(|first| first.checked_add_months(Months::new(1)))
                .and_then(|month| on_day_clamped(month, anchor_day)),
        };
        next.ok_or(SubscriptionError::DateOutOfRange)
    }
}

/// `day` within the month of `first`, or the month's last day if shorter.
fn on_day_clamped(first: NaiveDate, day: u32) -> Option<NaiveDate> {
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?.day();
    first.with_day(day.clamp(1, last))
}

/// # Errors
///
/// Returns [`SubscriptionError::InvalidQuantity`] outside 1..=`max`.
pub fn validate_quantity(quantity: u32, max: u32) -> Result<u32, SubscriptionError> {
    if quantity == 0 || quantity > max {
        return Err(SubscriptionError::InvalidQuantity(max));
    }
    Ok(quantity)
}

/// First delivery date: the requested one, or tomorrow.
///
/// # Errors
///
/// Returns [`SubscriptionError::StartNotInFuture`] for today or earlier.
pub fn first_delivery(
    requested: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<NaiveDate, SubscriptionError> {
    match requested {
        Some(date) if date > today => Ok(date),
        Some(_) => Err(SubscriptionError::StartNotInFuture),
        None => today.succ_opt().ok_or(SubscriptionError::DateOutOfRange),
    }
}

/// Advance `next` by `frequency` until it falls after `today`.
///
/// # Errors
///
/// Returns [`SubscriptionError::DateOutOfRange`] past the calendar's end.
pub fn roll_forward(
    mut next: NaiveDate,
    frequency: SubscriptionFrequency,
    anchor_day: u32,
    today: NaiveDate,
) -> Result<NaiveDate, SubscriptionError> {
    while next <= today {
        next = frequency.advance(next, anchor_day)?;
    }
    Ok(next)
}

/// Result of applying an action to a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub status: SubscriptionStatus,
    pub next_delivery_date: NaiveDate,
}

/// Apply a pause, resume or cancel.
///
/// # Errors
///
/// Returns [`SubscriptionError::InvalidTransition`] for moves the status
/// does not allow; cancelled subscriptions accept nothing.
pub fn apply_action(
    status: SubscriptionStatus,
    action: SubscriptionAction,
    frequency: SubscriptionFrequency,
    anchor_day: u32,
    next_delivery_date: NaiveDate,
    today: NaiveDate,
) -> Result<Transition, SubscriptionError> {
    use SubscriptionStatus::{Active, Cancelled, Paused};

    let invalid = || SubscriptionError::InvalidTransition { action, status };

    match (status, action) {
        (Active, SubscriptionAction::Pause) => Ok(Transition {
            status: Paused,
            next_delivery_date,
        }),
        (Paused, SubscriptionAction::Resume) => Ok(Transition {
            status: Active,
            next_delivery_date: roll_forward(next_delivery_date, frequency, anchor_day, today)?,
        }),
        (Active | Paused, SubscriptionAction::Cancel) => Ok(Transition {
            status: Cancelled,
            next_delivery_date,
        }),
        _ => Err(invalid()),
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
    fn test_advance() {
        let d = date(2024, 1, 31);
        assert_eq!(SubscriptionFrequency::Weekly.advance(d, 31).unwrap(), date(2024, 2, 7));
        assert_eq!(
            SubscriptionFrequency::Biweekly.advance(d, 31).unwrap(),
            date(2024, 2, 14)
        );
        assert_eq!(
            SubscriptionFrequency::Monthly.advance(d, 31).unwrap(),
            date(2024, 2, 29)
        );
    }

    #[test]
    fn test_monthly_returns_to_anchor_day() {
        let monthly = SubscriptionFrequency::Monthly;
        let mut day = date(2024, 1, 31);
        let mut seen = Vec::new();
        for _ in 0..4 {
            day = monthly.advance(day, 31).unwrap();
            seen.push(day);
        }
        assert_eq!(
            seen,
            [date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30), date(2024, 5, 31)]
        );

        assert_eq!(monthly.advance(date(2024, 12, 15), 15).unwrap(), date(2025, 1, 15));
        assert_eq!(
            roll_forward(date(2024, 1, 31), monthly, 31, date(2024, 3, 1)).unwrap(),
            date(2024, 3, 31)
        );
    }

    #[test]
    fn test_first_delivery() {
        let today = date(2024, 5, 10);
        assert_eq!(first_delivery(None, today).unwrap(), date(2024, 5, 11));
        assert_eq!(
            first_delivery(Some(today), today),
            Err(SubscriptionError::StartNotInFuture)
        );
        assert_eq!(
            first_delivery(Some(date(2024, 6, 1)), today).unwrap(),
            date(2024, 6, 1)
        );
    }

    #[test]
    fn test_resume_rolls_date_forward() {
        let today = date(2024, 5, 20);
        let t = apply_action(
            SubscriptionStatus::Paused,
            SubscriptionAction::Resume,
            SubscriptionFrequency::Weekly,
            1,
            date(2024, 5, 1),
            today,
        )
        .unwrap();
        assert_eq!(t.status, SubscriptionStatus::Active);
        assert_eq!(t.next_delivery_date, date(2024, 5, 22));
    }

    #[test]
    fn test_invalid_actions() {
        let d = date(2024, 5, 1);
        let freq = SubscriptionFrequency::Monthly;
        assert!(
            apply_action(SubscriptionStatus::Active, SubscriptionAction::Resume, freq, 1, d, d)
                .is_err()
        );
        assert!(
            apply_action(SubscriptionStatus::Paused, SubscriptionAction::Pause, freq, 1, d, d)
                .is_err()
        );
        assert!(
            apply_action(SubscriptionStatus::Cancelled, SubscriptionAction::Cancel, freq, 1, d, d)
                .is_err()
        );
        let t = apply_action(SubscriptionStatus::Paused, SubscriptionAction::Cancel, freq, 1, d, d)
            .unwrap();
        assert_eq!(t.status, SubscriptionStatus::Cancelled);
    }

    #[test]
    fn test_quantity() {
        assert!(validate_quantity(0, 50).is_err());
        assert!(validate_quantity(51, 50).is_err());
        assert_eq!(validate_quantity(3, 50).unwrap(), 3);
    }
}
