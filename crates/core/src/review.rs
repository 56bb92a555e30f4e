//! Product reviews.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::types::ReviewStatus;

pub const MAX_TITLE_CHARS: usize = 120;
pub const MAX_COMMENT_CHARS: usize = 2000;

/// Review validation and moderation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("rating must be between 1 and 5")]
    InvalidRating,

    #[error("title must be at most {MAX_TITLE_CHARS} characters")]
    TitleTooLong,

    #[error("comment must be at most {MAX_COMMENT_CHARS} characters")]
    CommentTooLong,

    #[error("only customers who received this product can review it")]
    NotPurchased,

    #[error("you have already reviewed this product")]
    AlreadyReviewed,

    #[error("cannot move review from {from} to {to}")]
    InvalidTransition { from: ReviewStatus, to: ReviewStatus },
}

/// Check rating and text lengths.
///
/// # Errors
///
/// Returns the first [`ReviewError`] found.
pub fn validate(rating: i16, title: Option<&str>, comment: Option<&str>) -> Result<(), ReviewError> {
    if !(1..=5).contains(&rating) {
        return Err(ReviewError::InvalidRating);
    }
    if title.is_some_and(|t| t.chars().count() > MAX_TITLE_CHARS) {
        return Err(ReviewError::TitleTooLong);
    }
    if comment.is_some_and(|c| c.chars().count() > MAX_COMMENT_CHARS) {
        return Err(ReviewError::CommentTooLong);
    }
    Ok(())
}

/// Check a moderation decision.
///
/// # Errors
///
/// Returns [`ReviewError::InvalidTransition`] for same-status moves and for
/// moving anything back to pending.
pub fn moderate(current: ReviewStatus, next: ReviewStatus) -> Result<ReviewStatus, ReviewError> {
    use ReviewStatus::{Approved, Pending, Rejected};

    match (current, next) {
        (Pending | Rejected, Approved) | (Pending | Approved, Rejected) => Ok(next),
        _ => Err(ReviewError::InvalidTransition {
            from: current,
            to: next,
        }),
    }
}

/// Aggregate of approved ratings for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct RatingSummary {
    pub count: u32,
    /// Mean rating to one decimal place; zero when there are no ratings.
    pub average: Decimal,
    /// Number of 1- through 5-star ratings.
    pub distribution: [u32; 5],
}

impl RatingSummary {
    /// Summarise ratings. Values outside 1..=5 are ignored.
    #[must_use]
    pub fn from_ratings(ratings: &[i16]) -> Self {
        let mut distribution = [0u32; 5];
        let mut sum: i64 = 0;
        let mut count: u32 = 0;

        for &rating in ratings {
            let Ok(bucket) = usize::try_from(rating.saturating_sub(1)) else {
                continue;
            };
            if let Some(slot) = distribution.get_mut(bucket) {
                *slot += 1;
                sum += i64::from(rating);
                count += 1;
            }
        }

        let average = if count == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(sum) / Decimal::from(count))
                .round_dp_with_strategy(1, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
        };

        Self {
            count,
            average,
            distribution,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(validate(5, Some("Great"), None).is_ok());
        assert_eq!(validate(0, None, None), Err(ReviewError::InvalidRating));
        assert_eq!(validate(6, None, None), Err(ReviewError::InvalidRating));
        let long = "x".repeat(MAX_TITLE_CHARS + 1);
        assert_eq!(validate(3, Some(&long), None), Err(ReviewError::TitleTooLong));
        let long = "x".repeat(MAX_COMMENT_CHARS + 1);
        assert_eq!(
            validate(3, None, Some(&long)),
            Err(ReviewError::CommentTooLong)
        );
    }

    #[test]
    fn test_moderation() {
        use ReviewStatus::{Approved, Pending, Rejected};
        assert_eq!(moderate(Pending, Approved).unwrap(), Approved);
        assert_eq!(moderate(Approved, Rejected).unwrap(), Rejected);
        assert_eq!(moderate(Rejected, Approved).unwrap(), Approved);
        assert!(moderate(Approved, Approved).is_err());
        assert!(moderate(Approved, Pending).is_err());
    }

    #[test]
    fn test_summary() {
        let summary = RatingSummary::from_ratings(&[5, 4, 4, 2]);
        assert_eq!(summary.count, 4);
        // 15 / 4 = 3.75
        assert_eq!(summary.average, Decimal::new(38, 1));
        assert_eq!(summary.distribution, [0, 1, 0, 2, 1]);
    }

    #[test]
    fn test_empty_summary() {
        let summary = RatingSummary::from_ratings(&[]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average, Decimal::ZERO);
    }
}
