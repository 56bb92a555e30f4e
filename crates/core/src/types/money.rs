//! Money helpers using decimal arithmetic.
//!
//! Amounts are plain [`Decimal`] values in the store currency's standard unit
//! (dollars, not cents). Every stored or displayed amount goes through
//! [`round_money`] so totals computed in different places always agree.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round an amount to two decimal places, midpoint away from zero.
///
/// ```
/// use rust_decimal::Decimal;
/// use wellspring_core::round_money;
///
/// assert_eq!(round_money(Decimal::new(12345, 3)), Decimal::new(1235, 2));
/// ```
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert an amount to integer minor units (cents) for payment gateways.
///
/// Returns `None` if the amount does not fit in an `i64`.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    let cents = round_money(amount) * Decimal::ONE_HUNDRED;
    i64::try_from(cents.trunc()).ok()
}

/// ISO 4217 currency codes accepted by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    NGN,
    KES,
}

impl CurrencyCode {
    /// Three-letter code as sent to the gateway.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
            Self::NGN => "NGN",
            Self::KES => "KES",
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            "NGN" => Ok(Self::NGN),
            "KES" => Ok(Self::KES),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_midpoint() {
        assert_eq!(round_money(Decimal::new(5, 3)), Decimal::new(1, 2));
        assert_eq!(round_money(Decimal::new(-5, 3)), Decimal::new(-1, 2));
        assert_eq!(round_money(Decimal::new(1994, 2)), Decimal::new(1994, 2));
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(1999, 2)), Some(1999));
        assert_eq!(to_minor_units(Decimal::new(5, 0)), Some(500));
        assert_eq!(to_minor_units(Decimal::new(10005, 3)), Some(1001));
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("ngn".parse::<CurrencyCode>(), Ok(CurrencyCode::NGN));
        assert!("XYZ".parse::<CurrencyCode>().is_err());
        assert_eq!(CurrencyCode::default().code(), "USD");
    }
}
