//! Promo code rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DiscountType, round_money};

/// Minimum promo code length after normalisation.
pub const MIN_CODE_LENGTH: usize = 3;
/// Maximum promo code length after normalisation.
pub const MAX_CODE_LENGTH: usize = 32;

/// Why a promo code cannot be created or applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PromoError {
    #[error("promo code must be {MIN_CODE_LENGTH}-{MAX_CODE_LENGTH} characters of A-Z, 0-9, '-' or '_'")]
    InvalidCode,

    #[error("percentage discounts must be greater than 0 and at most 100")]
    InvalidPercentage,

    #[error("discount value must be greater than 0")]
    InvalidAmount,

    #[error("promo code is not active")]
    Inactive,

    #[error("promo code is not valid yet")]
    NotStarted,

    #[error("promo code has expired")]
    Expired,

    #[error("promo code has reached its usage limit")]
    UsageLimitReached,

    #[error("order subtotal must be at least {0} to use this code")]
    MinimumNotMet(Decimal),
}

/// Normalise a user-entered promo code.
///
/// # Errors
///
/// Returns [`PromoError::InvalidCode`] for empty, oversized or malformed codes.
pub fn normalize_code(raw: &str) -> Result<String, PromoError> {
    let code = raw.trim().to_ascii_uppercase();
    let valid_chars = code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_');

    if !valid_chars || !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&code.len()) {
        return Err(PromoError::InvalidCode);
    }
    Ok(code)
}

/// The parts of a stored promo code that decide whether and how it applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoRules {
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    /// Cap for percentage discounts.
    pub max_discount: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl PromoRules {
    /// Validate the discount definition itself (used on create and update).
    ///
    /// # Errors
    ///
    /// Returns [`PromoError::InvalidPercentage`] or [`PromoError::InvalidAmount`].
    pub fn validate_definition(&self) -> Result<(), PromoError> {
        match self.discount_type {
            DiscountType::Percentage => {
                if self.discount_value <= Decimal::ZERO || self.discount_value > Decimal::ONE_HUNDRED
                {
                    return Err(PromoError::InvalidPercentage);
                }
            }
            DiscountType::Fixed => {
                if self.discount_value <= Decimal::ZERO {
                    return Err(PromoError::InvalidAmount);
                }
            }
        }
        if self.max_discount.is_some_and(|cap| cap <= Decimal::ZERO) {
            return Err(PromoError::InvalidAmount);
        }
        Ok(())
    }

    /// Discount for a goods subtotal at `now`.
    ///
    /// # Errors
    ///
    /// Returns the first rule the code breaks, checked in the order: active,
    /// started, expired, usage limit, minimum order amount.
    pub fn evaluate(&self, subtotal: Decimal, now: DateTime<Utc>) -> Result<Decimal, PromoError> {
        if !self.is_active {
            return Err(PromoError::Inactive);
        }
        if self.starts_at.is_some_and(|start| now < start) {
            return Err(PromoError::NotStarted);
        }
        if self.expires_at.is_some_and(|end| now >= end) {
            return Err(PromoError::Expired);
        }
        if self.usage_limit.is_some_and(|limit| self.used_count >= limit) {
            return Err(PromoError::UsageLimitReached);
        }
        if let Some(min) = self.min_order_amount
            && subtotal < min
        {
            return Err(PromoError::MinimumNotMet(min));
        }

        let raw = match self.discount_type {
            DiscountType::Percentage => {
                let pct = subtotal * self.discount_value / Decimal::ONE_HUNDRED;
                self.max_discount.map_or(pct, |cap| pct.min(cap))
            }
            DiscountType::Fixed => self.discount_value,
        };

        Ok(round_money(raw.min(subtotal).max(Decimal::ZERO)))
    }

    /// Whether the code can no longer be used because of its end date.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|end| now >= end)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn percent(value: i64) -> PromoRules {
        PromoRules {
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::new(value, 0),
            max_discount: None,
            min_order_amount: None,
            usage_limit: None,
            used_count: 0,
            starts_at: None,
            expires_at: None,
            is_active: true,
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  summer-10 ").unwrap(), "SUMMER-10");
        assert_eq!(normalize_code("ab"), Err(PromoError::InvalidCode));
        assert_eq!(normalize_code("no spaces"), Err(PromoError::InvalidCode));
        assert_eq!(normalize_code(&"A".repeat(33)), Err(PromoError::InvalidCode));
    }

    #[test]
    fn test_percentage_with_cap() {
        let mut rules = percent(20);
        let now = Utc::now();
        assert_eq!(
            rules.evaluate(Decimal::new(4000, 2), now).unwrap(),
            Decimal::new(800, 2)
        );
        rules.max_discount = Some(Decimal::new(500, 2));
        assert_eq!(
            rules.evaluate(Decimal::new(4000, 2), now).unwrap(),
            Decimal::new(500, 2)
        );
    }

    #[test]
    fn test_fixed_capped_at_subtotal() {
        let rules = PromoRules {
            discount_type: DiscountType::Fixed,
            discount_value: Decimal::new(1500, 2),
            ..percent(1)
        };
        assert_eq!(
            rules.evaluate(Decimal::new(1000, 2), Utc::now()).unwrap(),
            Decimal::new(1000, 2)
        );
    }

    #[test]
    fn test_window_and_limits() {
        let now = Utc::now();
        let mut rules = percent(10);

        rules.starts_at = Some(now + Duration::hours(1));
        assert_eq!(rules.evaluate(Decimal::TEN, now), Err(PromoError::NotStarted));

        rules.starts_at = None;
        rules.expires_at = Some(now);
        assert_eq!(rules.evaluate(Decimal::TEN, now), Err(PromoError::Expired));
        assert!(rules.is_expired(now));

        rules.expires_at = None;
        rules.usage_limit = Some(3);
        rules.used_count = 3;
        assert_eq!(
            rules.evaluate(Decimal::TEN, now),
            Err(PromoError::UsageLimitReached)
        );

        rules.usage_limit = None;
        rules.min_order_amount = Some(Decimal::new(2000, 2));
        assert_eq!(
            rules.evaluate(Decimal::TEN, now),
            Err(PromoError::MinimumNotMet(Decimal::new(2000, 2)))
        );

        rules.is_active = false;
        assert_eq!(rules.evaluate(Decimal::TEN, now), Err(PromoError::Inactive));
    }

    #[test]
    fn test_definition_validation() {
        assert_eq!(
            percent(0).validate_definition(),
            Err(PromoError::InvalidPercentage)
        );
        assert_eq!(
            percent(101).validate_definition(),
            Err(PromoError::InvalidPercentage)
        );
        assert!(percent(100).validate_definition().is_ok());
    }
}
