//! Status and kind enums for marketplace entities.
//!
//! Each enum maps to a PostgreSQL enum in the `market` schema (with the
//! `postgres` feature) and serialises as `snake_case` in JSON. Type names are
//! unqualified; storefront connections put `market` on the search path.

use serde::{Deserialize, Serialize};

/// Implements `as_str`, `Display` and `FromStr` from one table of names so
/// the three can never drift apart.
macro_rules! impl_str_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The `snake_case` name used in JSON and the database.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", $label, ": {}"), s)),
                }
            }
        }
    };
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Shops, reviews, tracks intake.
    #[default]
    Customer,
    /// Sells through approved brands.
    Vendor,
    /// Runs the marketplace.
    Admin,
}

impl_str_enum!(UserRole, "user role", {
    Customer => "customer",
    Vendor => "vendor",
    Admin => "admin",
});

/// Fulfilment status shared by orders and order items.
///
/// The declaration order is the lifecycle order; `Cancelled` sits outside
/// it. See [`crate::order`] for the transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl_str_enum!(OrderStatus, "order status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl_str_enum!(PaymentStatus, "payment status", {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid to the courier; becomes paid when the order is delivered.
    #[default]
    #[serde(alias = "cod")]
    CashOnDelivery,
    /// Paid up front through the hosted gateway checkout.
    Card,
}

impl_str_enum!(PaymentMethod, "payment method", {
    CashOnDelivery => "cash_on_delivery",
    Card => "card",
});

/// Moderation state of a product review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "review_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl_str_enum!(ReviewStatus, "review status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

/// Vendor payout request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payout_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    #[default]
    Pending,
    Approved,
    Paid,
    Rejected,
}

impl_str_enum!(PayoutStatus, "payout status", {
    Pending => "pending",
    Approved => "approved",
    Paid => "paid",
    Rejected => "rejected",
});

/// Promo code discount kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "discount_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Percent of the goods subtotal.
    Percentage,
    /// Flat amount off the goods subtotal.
    Fixed,
}

impl_str_enum!(DiscountType, "discount type", {
    Percentage => "percentage",
    Fixed => "fixed",
});

/// Delivery cadence for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "subscription_frequency", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionFrequency {
    Weekly,
    Biweekly,
    Monthly,
}

impl_str_enum!(SubscriptionFrequency, "subscription frequency", {
    Weekly => "weekly",
    Biweekly => "biweekly",
    Monthly => "monthly",
});

/// Subscription state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "subscription_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Paused,
    Cancelled,
}

impl_str_enum!(SubscriptionStatus, "subscription status", {
    Active => "active",
    Paused => "paused",
    Cancelled => "cancelled",
});

/// Self-reported activity level used for the recommended intake goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "activity_level", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    #[default]
    Moderate,
    Active,
    VeryActive,
}

impl_str_enum!(ActivityLevel, "activity level", {
    Sedentary => "sedentary",
    Light => "light",
    Moderate => "moderate",
    Active => "active",
    VeryActive => "very_active",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse_agree() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), *status);
        }
        for role in UserRole::ALL {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), *role);
        }
        assert!("shipping".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_serde_matches_as_str() {
        let json = serde_json::to_string(&ActivityLevel::VeryActive).unwrap();
        assert_eq!(json, "\"very_active\"");
        let json = serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap();
        assert_eq!(json, format!("\"{}\"", PaymentMethod::CashOnDelivery.as_str()));
    }

    #[test]
    fn test_payment_method_accepts_cod_alias() {
        let method: PaymentMethod = serde_json::from_str("\"cod\"").unwrap();
        assert_eq!(method, PaymentMethod::CashOnDelivery);
    }

    #[test]
    fn test_parse_error_names_the_kind() {
        let err = "gold".parse::<UserRole>().unwrap_err();
        assert_eq!(err, "invalid user role: gold");
    }
}
