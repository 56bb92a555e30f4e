//! Vendor balance and payout requests.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::types::{PayoutStatus, round_money};

/// Why a payout request or status change was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayoutError {
    #[error("payout amount must be greater than 0")]
    NonPositive,

    #[error("minimum payout is {0}")]
    BelowMinimum(Decimal),

    #[error("amount exceeds available balance of {0}")]
    ExceedsAvailable(Decimal),

    #[error("a payout request is already open")]
    AlreadyOpen,

    #[error("cannot move payout from {from} to {to}")]
    InvalidTransition { from: PayoutStatus, to: PayoutStatus },
}

/// What an admin does to a payout request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutAction {
    Approve,
    Reject,
    MarkPaid,
}

impl PayoutAction {
    /// Status the action moves a payout to.
    #[must_use]
    pub const fn target(self) -> PayoutStatus {
        match self {
            Self::Approve => PayoutStatus::Approved,
            Self::Reject => PayoutStatus::Rejected,
            Self::MarkPaid => PayoutStatus::Paid,
        }
    }
}

/// Money a vendor has earned and what has been or is being paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VendorBalance {
    /// Sum of settled vendor earnings.
    pub total_earnings: Decimal,
    /// Sum of `paid` payouts.
    pub total_paid: Decimal,
    /// Sum of `pending` and `approved` payouts.
    pub pending: Decimal,
}

impl VendorBalance {
    /// Amount the vendor may still request.
    #[must_use]
    pub fn available(&self) -> Decimal {
        round_money(
            (self.total_earnings - self.total_paid - self.pending).max(Decimal::ZERO),
        )
    }
}

/// Check a new payout request.
///
/// # Errors
///
/// Returns a [`PayoutError`] naming the first rule the request breaks.
pub fn validate_request(
    amount: Decimal,
    balance: &VendorBalance,
    min_payout: Decimal,
    has_open_request: bool,
) -> Result<Decimal, PayoutError> {
    let amount = round_money(amount);
    if amount <= Decimal::ZERO {
        return Err(PayoutError::NonPositive);
    }
    if amount < min_payout {
        return Err(PayoutError::BelowMinimum(min_payout));
    }
    if has_open_request {
        return Err(PayoutError::AlreadyOpen);
    }
    let available = balance.available();
    if amount > available {
        return Err(PayoutError::ExceedsAvailable(available));
    }
    Ok(amount)
}

impl PayoutStatus {
    /// Whether a payout in this status can move to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Paid | Self::Rejected)
        )
    }

    /// Whether the request still counts against the vendor's balance.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }
}

/// Validate an admin action against the payout's current status.
///
/// # Errors
///
/// Returns [`PayoutError::InvalidTransition`] if the move is not allowed.
pub fn apply_action(current: PayoutStatus, action: PayoutAction) -> Result<PayoutStatus, PayoutError> {
    let next = action.target();
    if current.can_transition_to(next) {
        Ok(next)
    } else {
        Err(PayoutError::InvalidTransition {
            from: current,
            to: next,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn balance(earned: i64, paid: i64, pending: i64) -> VendorBalance {
        VendorBalance {
            total_earnings: Decimal::new(earned, 2),
            total_paid: Decimal::new(paid, 2),
            pending: Decimal::new(pending, 2),
        }
    }

    #[test]
    fn test_available_never_negative() {
        assert_eq!(balance(10000, 2500, 1500).available(), Decimal::new(6000, 2));
        assert_eq!(balance(1000, 2000, 0).available(), Decimal::ZERO);
    }

    #[test]
    fn test_request_rules() {
        let b = balance(10000, 0, 0);
        let min = Decimal::new(2000, 2);

        assert_eq!(
            validate_request(Decimal::ZERO, &b, min, false),
            Err(PayoutError::NonPositive)
        );
        assert_eq!(
            validate_request(Decimal::TEN, &b, min, false),
            Err(PayoutError::BelowMinimum(min))
        );
        assert_eq!(
            validate_request(Decimal::new(5000, 2), &b, min, true),
            Err(PayoutError::AlreadyOpen)
        );
        assert_eq!(
            validate_request(Decimal::new(10001, 2), &b, min, false),
            Err(PayoutError::ExceedsAvailable(Decimal::new(10000, 2)))
        );
        assert_eq!(
            validate_request(Decimal::new(10000, 2), &b, min, false).unwrap(),
            Decimal::new(10000, 2)
        );
    }

    #[test]
    fn test_transitions() {
        use PayoutStatus::{Approved, Paid, Pending, Rejected};

        assert_eq!(apply_action(Pending, PayoutAction::Approve).unwrap(), Approved);
        assert_eq!(apply_action(Approved, PayoutAction::MarkPaid).unwrap(), Paid);
        assert_eq!(apply_action(Approved, PayoutAction::Reject).unwrap(), Rejected);
        assert!(apply_action(Pending, PayoutAction::MarkPaid).is_err());
        assert!(apply_action(Paid, PayoutAction::Reject).is_err());
        assert!(apply_action(Rejected, PayoutAction::Approve).is_err());
    }

    #[test]
    fn test_open_statuses() {
        assert!(PayoutStatus::Pending.is_open());
        assert!(PayoutStatus::Approved.is_open());
        assert!(!PayoutStatus::Paid.is_open());
    }
}
