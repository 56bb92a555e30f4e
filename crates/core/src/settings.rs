//! Runtime store settings.
//!
//! Admins edit these from the dashboard; they are stored as a single JSON
//! document so new fields can be added without a migration. Fields missing
//! from the stored document fall back to [`StoreSettings::default`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings key under which [`StoreSettings`] are stored.
pub const STORE_SETTINGS_KEY: &str = "store";

/// A settings field is outside its allowed range.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid setting {field}: {reason}")]
pub struct SettingsError {
    /// Offending field name.
    pub field: &'static str,
    /// What is wrong with it.
    pub reason: String,
}

impl SettingsError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Store-wide business settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Display name used in emails.
    pub store_name: String,
    /// Reply-to address for customer emails.
    pub support_email: String,
    /// Commission percentage for vendors without an override.
    pub default_commission_rate: Decimal,
    /// Flat delivery fee per order.
    pub delivery_fee: Decimal,
    /// Goods total (after discount) at which delivery becomes free. Zero disables.
    pub free_delivery_threshold: Decimal,
    /// Smallest payout a vendor may request.
    pub min_payout_amount: Decimal,
    /// Largest quantity of one product per order or subscription.
    pub max_quantity_per_item: u32,
    /// Stock level at or below which vendors see a low-stock flag.
    pub low_stock_threshold: i32,
    /// Hours an unpaid card order may stay pending before cleanup cancels it.
    pub pending_order_ttl_hours: u32,
    /// Reject new orders while true.
    pub maintenance_mode: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            store_name: "Wellspring".to_owned(),
            support_email: "support@wellspring.test".to_owned(),
            default_commission_rate: Decimal::TEN,
            delivery_fee: Decimal::new(500, 2),
            free_delivery_threshold: Decimal::new(5000, 2),
            min_payout_amount: Decimal::new(2000, 2),
            max_quantity_per_item: 50,
            low_stock_threshold: 10,
            pending_order_ttl_hours: 24,
            maintenance_mode: false,
        }
    }
}

impl StoreSettings {
    /// Check every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns the first [`SettingsError`] found.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.store_name.trim().is_empty() {
            return Err(SettingsError::new("store_name", "cannot be empty"));
        }
        if !self.support_email.contains('@') {
            return Err(SettingsError::new("support_email", "must be an email address"));
        }
        if self.default_commission_rate < Decimal::ZERO
            || self.default_commission_rate > Decimal::ONE_HUNDRED
        {
            return Err(SettingsError::new(
                "default_commission_rate",
                "must be between 0 and 100",
            ));
        }
        for (field, value) in [
            ("delivery_fee", self.delivery_fee),
            ("free_delivery_threshold", self.free_delivery_threshold),
            ("min_payout_amount", self.min_payout_amount),
        ] {
            if value < Decimal::ZERO {
                return Err(SettingsError::new(field, "cannot be negative"));
            }
        }
        if !(1..=1000).contains(&self.max_quantity_per_item) {
            return Err(SettingsError::new(
                "max_quantity_per_item",
                "must be between 1 and 1000",
            ));
        }
        if self.low_stock_threshold < 0 {
            return Err(SettingsError::new("low_stock_threshold", "cannot be negative"));
        }
        if !(1..=720).contains(&self.pending_order_ttl_hours) {
            return Err(SettingsError::new(
                "pending_order_ttl_hours",
                "must be between 1 and 720",
            ));
        }
        Ok(())
    }

    /// Parse stored JSON, filling gaps with defaults.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error if the document has the wrong shape.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// The subset of settings anonymous visitors may read.
#[derive(Debug, Clone, Serialize)]
pub struct PublicSettings {
    pub store_name: String,
    pub delivery_fee: Decimal,
    pub free_delivery_threshold: Decimal,
    pub max_quantity_per_item: u32,
    pub maintenance_mode: bool,
}

impl From<&StoreSettings> for PublicSettings {
    fn from(s: &StoreSettings) -> Self {
        Self {
            store_name: s.store_name.clone(),
            delivery_fee: s.delivery_fee,
            free_delivery_threshold: s.free_delivery_threshold,
            max_quantity_per_item: s.max_quantity_per_item,
            maintenance_mode: s.maintenance_mode,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(StoreSettings::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let settings =
            StoreSettings::from_json(serde_json::json!({ "delivery_fee": "7.50" })).unwrap();
        assert_eq!(settings.delivery_fee, Decimal::new(750, 2));
        assert_eq!(settings.max_quantity_per_item, 50);
    }

    #[test]
    fn test_commission_out_of_range() {
        let settings = StoreSettings {
            default_commission_rate: Decimal::new(101, 0),
            ..StoreSettings::default()
        };
        let err = settings.validate().unwrap_err();
        assert_eq!(err.field, "default_commission_rate");
    }

    #[test]
    fn test_negative_fee_rejected() {
        let settings = StoreSettings {
            delivery_fee: Decimal::new(-1, 0),
            ..StoreSettings::default()
        };
        assert_eq!(settings.validate().unwrap_err().field, "delivery_fee");
    }
}
