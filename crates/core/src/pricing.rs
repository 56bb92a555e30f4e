//! Cart pricing.
//!
//! Turns cart lines into a [`Quote`]: goods subtotal, refundable jar
//! deposits (less any empty jars the customer hands back), promo discount,
//! delivery fee, and the grand total. The same function prices the cart
//! preview and the order at checkout, so the two cannot disagree.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::settings::StoreSettings;
use crate::types::{ProductId, VendorId, round_money};

/// Reasons a cart cannot be priced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Nothing to price.
    #[error("cart is empty")]
    EmptyCart,

    /// Quantity is zero or above the per-item limit.
    #[error("quantity for {product} must be between 1 and {max}")]
    InvalidQuantity {
        /// Product name.
        product: String,
        /// Per-item limit.
        max: u32,
    },

    /// Product is no longer for sale.
    #[error("{0} is not available")]
    Unavailable(String),

    /// Not enough stock for the requested quantity.
    #[error("only {available} of {product} left in stock")]
    InsufficientStock {
        /// Product name.
        product: String,
        /// Units in stock.
        available: i32,
    },
}

/// A product line as loaded for pricing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: ProductId,
    /// Vendor owning the product's brand.
    pub vendor_id: VendorId,
    /// Product name at pricing time.
    pub name: String,
    /// Current price per unit, before deposits.
    pub unit_price: Decimal,
    /// Requested units.
    pub quantity: u32,
    /// Refillable jar that carries a deposit.
    pub is_jar: bool,
    /// Deposit per unit; zero unless `is_jar`.
    pub jar_deposit: Decimal,
    /// Units in stock when loaded.
    pub stock: i32,
    /// Inactive products cannot be ordered.
    pub is_active: bool,
}

impl PricedLine {
    /// Goods total for the line.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        round_money(self.unit_price * Decimal::from(self.quantity))
    }
}

/// Priced cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    /// Merged lines, ordered by product ID.
    #[serde(skip)]
    pub lines: Vec<PricedLine>,
    /// Sum of line totals, excluding deposits.
    pub subtotal: Decimal,
    /// Deposits on every jar in the cart.
    pub jar_deposit_gross: Decimal,
    /// Deposit returned for empty jars handed back.
    pub jar_deposit_credit: Decimal,
    /// Gross deposits less the credit; never negative.
    pub jar_deposit_total: Decimal,
    /// Returned jars actually credited, capped at jars ordered.
    pub returned_jars_applied: u32,
    /// Promo discount, applied to the subtotal only.
    pub discount_total: Decimal,
    /// Zero once the discounted subtotal reaches the free-delivery threshold.
    pub delivery_fee: Decimal,
    /// Amount charged: subtotal less discount, plus deposits and delivery.
    pub total: Decimal,
}

/// Merge duplicate product lines, summing their quantities.
///
/// The first occurrence of a product supplies its price and metadata.
#[must_use]
pub fn merge_lines(lines: Vec<PricedLine>) -> Vec<PricedLine> {
    let mut merged: BTreeMap<ProductId, PricedLine> = BTreeMap::new();
    for line in lines {
        merged
            .entry(line.product_id)
            .and_modify(|existing| existing.quantity = existing.quantity.saturating_add(line.quantity))
            .or_insert(line);
    }
    merged.into_values().collect()
}

/// Check quantities, availability and stock for merged lines.
///
/// # Errors
///
/// Returns the first [`PricingError`] found.
pub fn validate_lines(lines: &[PricedLine], max_quantity: u32) -> Result<(), PricingError> {
    if lines.is_empty() {
        return Err(PricingError::EmptyCart);
    }

    for line in lines {
        if line.quantity == 0 || line.quantity > max_quantity {
            return Err(PricingError::InvalidQuantity {
                product: line.name.clone(),
                max: max_quantity,
            });
        }
        if !line.is_active {
            return Err(PricingError::Unavailable(line.name.clone()));
        }
        if i64::from(line.stock) < i64::from(line.quantity) {
            return Err(PricingError::InsufficientStock {
                product: line.name.clone(),
                available: line.stock.max(0),
            });
        }
    }

    Ok(())
}

/// Credit returned jars against jar deposits, most expensive deposit first.
///
/// Returns `(gross, credit, jars_applied)`.
#[must_use]
pub fn jar_deposits(lines: &[PricedLine], returned_jars: u32) -> (Decimal, Decimal, u32) {
    let mut jar_lines: Vec<&PricedLine> = lines.iter().filter(|l| l.is_jar).collect();
    jar_lines.sort_by(|a, b| b.jar_deposit.cmp(&a.jar_deposit));

    let gross: Decimal = jar_lines
        .iter()
        .map(|l| l.jar_deposit * Decimal::from(l.quantity))
        .sum();

    let mut remaining = returned_jars;
    let mut credit = Decimal::ZERO;
    for line in jar_lines {
        if remaining == 0 {
            break;
        }
        let applied = remaining.min(line.quantity);
        credit += line.jar_deposit * Decimal::from(applied);
        remaining -= applied;
    }

    (
        round_money(gross),
        round_money(credit),
        returned_jars - remaining,
    )
}

/// Price a cart.
///
/// `discount` is the promo discount already evaluated against the goods
/// subtotal (see [`crate::promo`]); it is capped here again so a stale
/// value can never push the goods total below zero.
///
/// # Errors
///
/// Returns a [`PricingError`] if the lines fail validation.
pub fn quote(
    lines: Vec<PricedLine>,
    returned_jars: u32,
    discount: Decimal,
    settings: &StoreSettings,
) -> Result<Quote, PricingError> {
    let lines = merge_lines(lines);
    validate_lines(&lines, settings.max_quantity_per_item)?;

    let subtotal: Decimal = lines.iter().map(PricedLine::line_total).sum();
    let discount_total = round_money(discount.max(Decimal::ZERO).min(subtotal));
    let (gross, credit, applied) = jar_deposits(&lines, returned_jars);
    let jar_deposit_total = gross - credit;

    let goods_after_discount = subtotal - discount_total;
    let free_delivery = settings.free_delivery_threshold > Decimal::ZERO
        && goods_after_discount >= settings.free_delivery_threshold;
    let delivery_fee = if free_delivery {
        Decimal::ZERO
    } else {
        round_money(settings.delivery_fee)
    };

    let total = round_money(goods_after_discount + jar_deposit_total + delivery_fee);

    Ok(Quote {
        lines,
        subtotal,
        jar_deposit_gross: gross,
        jar_deposit_credit: credit,
        jar_deposit_total,
        returned_jars_applied: applied,
        discount_total,
        delivery_fee,
        total,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, price: i64, qty: u32) -> PricedLine {
        PricedLine {
            product_id: ProductId::new(id),
            vendor_id: VendorId::new(1),
            name: format!("Product {id}"),
            unit_price: Decimal::new(price, 2),
            quantity: qty,
            is_jar: false,
            jar_deposit: Decimal::ZERO,
            stock: 100,
            is_active: true,
        }
    }

    fn jar(id: i32, price: i64, deposit: i64, qty: u32) -> PricedLine {
        PricedLine {
            is_jar: true,
            jar_deposit: Decimal::new(deposit, 2),
            ..line(id, price, qty)
        }
    }

    #[test]
    fn test_simple_quote_with_delivery_fee() {
        let settings = StoreSettings::default();
        let q = quote(vec![line(1, 199, 3)], 0, Decimal::ZERO, &settings).unwrap();
        assert_eq!(q.subtotal, Decimal::new(597, 2));
        assert_eq!(q.delivery_fee, Decimal::new(500, 2));
        assert_eq!(q.total, Decimal::new(1097, 2));
    }

    #[test]
    fn test_free_delivery_uses_discounted_goods_total() {
        let settings = StoreSettings::default();
        // 50.00 of goods qualifies
        let q = quote(vec![line(1, 2500, 2)], 0, Decimal::ZERO, &settings).unwrap();
        assert_eq!(q.delivery_fee, Decimal::ZERO);
        // ...but not after a 5.00 discount
        let q = quote(vec![line(1, 2500, 2)], 0, Decimal::new(500, 2), &settings).unwrap();
        assert_eq!(q.delivery_fee, Decimal::new(500, 2));
        assert_eq!(q.total, Decimal::new(5000, 2));
    }

    #[test]
    fn test_jar_deposit_credit_prefers_expensive_deposits() {
        let lines = vec![jar(1, 800, 300, 2), jar(2, 900, 500, 1), line(3, 100, 1)];
        let (gross, credit, applied) = jar_deposits(&lines, 2);
        assert_eq!(gross, Decimal::new(1100, 2));
        // 5.00 + 3.00
        assert_eq!(credit, Decimal::new(800, 2));
        assert_eq!(applied, 2);
    }

    #[test]
    fn test_returned_jars_capped_at_jar_units() {
        let settings = StoreSettings::default();
        let q = quote(vec![jar(1, 800, 300, 2)], 5, Decimal::ZERO, &settings).unwrap();
        assert_eq!(q.returned_jars_applied, 2);
        assert_eq!(q.jar_deposit_total, Decimal::ZERO);
    }

    #[test]
    fn test_discount_never_exceeds_subtotal() {
        let settings = StoreSettings::default();
        let q = quote(vec![line(1, 300, 1)], 0, Decimal::new(1000, 2), &settings).unwrap();
        assert_eq!(q.discount_total, Decimal::new(300, 2));
        assert_eq!(q.total, Decimal::new(500, 2));
    }

    #[test]
    fn test_duplicate_lines_merge_before_stock_check() {
        let settings = StoreSettings::default();
        let mut a = line(1, 100, 30);
        a.stock = 40;
        let b = line(1, 100, 20);
        let err = quote(vec![a, b], 0, Decimal::ZERO, &settings).unwrap_err();
        assert!(matches!(err, PricingError::InsufficientStock { available: 40, .. }));
    }

    #[test]
    fn test_rejects_empty_and_inactive() {
        let settings = StoreSettings::default();
        assert_eq!(
            quote(Vec::new(), 0, Decimal::ZERO, &settings),
            Err(PricingError::EmptyCart)
        );

        let mut inactive = line(1, 100, 1);
        inactive.is_active = false;
        assert!(matches!(
            quote(vec![inactive], 0, Decimal::ZERO, &settings),
            Err(PricingError::Unavailable(_))
        ));
    }

    #[test]
    fn test_quantity_limit() {
        let settings = StoreSettings {
            max_quantity_per_item: 5,
            ..StoreSettings::default()
        };
        assert!(matches!(
            quote(vec![line(1, 100, 6)], 0, Decimal::ZERO, &settings),
            Err(PricingError::InvalidQuantity { max: 5, .. })
        ));
    }
}
