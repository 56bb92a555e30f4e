//! Vendor commission.
//!
//! The rate is snapshotted on each order item at checkout so later changes
//! to a vendor's rate never touch orders already placed. The commission
//! itself is only computed when the item is delivered.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::types::round_money;

/// Commission rate outside 0..=100 percent.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("commission rate must be between 0 and 100, got {0}")]
pub struct InvalidRate(pub Decimal);

/// Check a commission percentage.
///
/// # Errors
///
/// Returns [`InvalidRate`] when the rate is negative or above 100.
pub fn validate_rate(rate: Decimal) -> Result<Decimal, InvalidRate> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(InvalidRate(rate));
    }
    Ok(rate)
}

/// The vendor's own rate if set, otherwise the store default.
#[must_use]
pub fn effective_rate(vendor_override: Option<Decimal>, store_default: Decimal) -> Decimal {
    vendor_override.unwrap_or(store_default)
}

/// Platform and vendor shares of a delivered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub commission_amount: Decimal,
    pub vendor_earning: Decimal,
}

/// Split a delivered line between platform and vendor.
///
/// Jar deposits are not part of `unit_price` and never enter the split.
#[must_use]
pub fn settle(unit_price: Decimal, quantity: u32, rate: Decimal) -> Settlement {
    let line_total = round_money(unit_price * Decimal::from(quantity));
    let commission_amount = round_money(line_total * rate / Decimal::ONE_HUNDRED);
    Settlement {
        commission_amount,
        vendor_earning: line_total - commission_amount,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        assert_eq!(
            effective_rate(Some(Decimal::new(75, 1)), Decimal::TEN),
            Decimal::new(75, 1)
        );
        assert_eq!(effective_rate(None, Decimal::TEN), Decimal::TEN);
    }

    #[test]
    fn test_settle_rounds_commission() {
        // 3 x 3.33 = 9.99, 12.5% = 1.24875
        let s = settle(Decimal::new(333, 2), 3, Decimal::new(125, 1));
        assert_eq!(s.commission_amount, Decimal::new(125, 2));
        assert_eq!(s.vendor_earning, Decimal::new(874, 2));
    }

    #[test]
    fn test_shares_add_up() {
        let s = settle(Decimal::new(1999, 2), 7, Decimal::new(15, 0));
        assert_eq!(
            s.commission_amount + s.vendor_earning,
            Decimal::new(13993, 2)
        );
    }

    #[test]
    fn test_zero_and_full_rate() {
        let s = settle(Decimal::TEN, 2, Decimal::ZERO);
        assert_eq!(s.commission_amount, Decimal::ZERO);
        assert_eq!(s.vendor_earning, Decimal::new(20, 0));

        let s = settle(Decimal::TEN, 2, Decimal::ONE_HUNDRED);
        assert_eq!(s.vendor_earning, Decimal::ZERO);
    }

    #[test]
    fn test_validate_rate() {
        assert!(validate_rate(Decimal::new(-1, 0)).is_err());
        assert!(validate_rate(Decimal::new(1001, 1)).is_err());
        assert_eq!(validate_rate(Decimal::ZERO).unwrap(), Decimal::ZERO);
    }
}
