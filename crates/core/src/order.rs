//! Order lifecycle rules.
//!
//! A marketplace order can contain items from several vendors, and each
//! vendor moves its own items forward. The parent order never gets a status
//! of its own: it is recomputed from its items after every change.
//!
//! ```text
//! pending -> confirmed -> processing -> shipped -> delivered
//!    \___________\______________\
//!                                 -> cancelled
//! ```
//!
//! Forward jumps are allowed (a vendor may confirm and ship in one step);
//! going backwards is not. Once shipped, an item can no longer be cancelled.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{OrderId, OrderStatus};

/// Errors raised by order lifecycle rules.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// The requested status change is not allowed.
    #[error("cannot move from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },

    /// An order must have at least one item.
    #[error("order has no items")]
    NoItems,

    /// The customer tried to cancel after fulfilment started.
    #[error("orders can only be cancelled before processing starts (current status: {0})")]
    NotCancellable(OrderStatus),
}

impl OrderStatus {
    /// Position in the lifecycle, or `None` for `Cancelled`.
    #[must_use]
    pub const fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Processing => Some(2),
            Self::Shipped => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled => None,
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether an item or order in this status can move to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() || self == next {
            return false;
        }

        match (self.rank(), next.rank()) {
            (Some(_), None) => matches!(self, Self::Pending | Self::Confirmed | Self::Processing),
            (Some(current), Some(target)) => target > current,
            (None, _) => false,
        }
    }
}

/// Minimal view of an order item needed for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemState {
    /// Current item status.
    pub status: OrderStatus,
    /// Units ordered.
    pub quantity: u32,
}

/// Side effects the caller must apply after an item changes status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemTransition {
    /// Units to put back into product stock.
    pub restock: Option<u32>,
    /// Commission must be settled for the item.
    pub settle: bool,
}

/// Validate an item status change and report what must happen next.
///
/// # Errors
///
/// Returns [`OrderError::InvalidTransition`] when the move is not allowed.
pub fn apply_item_transition(item: ItemState, next: OrderStatus) -> Result<ItemTransition, OrderError> {
    if !item.status.can_transition_to(next) {
        return Err(OrderError::InvalidTransition {
            from: item.status,
            to: next,
        });
    }

    Ok(ItemTransition {
        restock: (next == OrderStatus::Cancelled).then_some(item.quantity),
        settle: next == OrderStatus::Delivered,
    })
}

/// Derive a parent order status from its items.
///
/// Cancelled items are ignored. An order whose items are all cancelled is
/// cancelled; otherwise it sits at the least advanced remaining status, so
/// an order is only `delivered` once every live item is.
///
/// # Errors
///
/// Returns [`OrderError::NoItems`] for an empty slice.
pub fn aggregate_status(items: &[OrderStatus]) -> Result<OrderStatus, OrderError> {
    if items.is_empty() {
        return Err(OrderError::NoItems);
    }

    Ok(items
        .iter()
        .filter_map(|status| status.rank().map(|rank| (rank, *status)))
        .min_by_key(|(rank, _)| *rank)
        .map_or(OrderStatus::Cancelled, |(_, status)| status))
}

/// Check that a customer may still cancel an order.
///
/// # Errors
///
/// Returns [`OrderError::NotCancellable`] once processing has started.
pub const fn ensure_cancellable_by_customer(status: OrderStatus) -> Result<(), OrderError> {
    match status {
        OrderStatus::Pending | OrderStatus::Confirmed => Ok(()),
        other => Err(OrderError::NotCancellable(other)),
    }
}

/// Human-facing order number, e.g. `WS-20240315-000042`.
#[must_use]
pub fn order_number(id: OrderId, created_at: DateTime<Utc>) -> String {
    format!("WS-{}-{:06}", created_at.format("%Y%m%d"), id.as_i32())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use OrderStatus::{Cancelled, Confirmed, Delivered, Pending, Processing, Shipped};

    #[test]
    fn test_forward_moves_allowed() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Shipped));
        assert!(Processing.can_transition_to(Delivered));
        assert!(Shipped.can_transition_to(Delivered));
    }

    #[test]
    fn test_backward_and_same_moves_rejected() {
        assert!(!Shipped.can_transition_to(Processing));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Confirmed.can_transition_to(Confirmed));
    }

    #[test]
    fn test_cancellation_window() {
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Cancelled));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn test_apply_item_transition_effects() {
        let item = ItemState {
            status: Confirmed,
            quantity: 4,
        };
        let cancelled = apply_item_transition(item, Cancelled).unwrap();
        assert_eq!(cancelled.restock, Some(4));
        assert!(!cancelled.settle);

        let shipped = ItemState {
            status: Shipped,
            quantity: 4,
        };
        let delivered = apply_item_transition(shipped, Delivered).unwrap();
        assert_eq!(delivered.restock, None);
        assert!(delivered.settle);

        let err = apply_item_transition(shipped, Cancelled).unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidTransition {
                from: Shipped,
                to: Cancelled
            }
        );
    }

    #[test]
    fn test_aggregate_takes_least_advanced_live_item() {
        assert_eq!(aggregate_status(&[Delivered, Shipped]).unwrap(), Shipped);
        assert_eq!(aggregate_status(&[Confirmed, Pending]).unwrap(), Pending);
        assert_eq!(
            aggregate_status(&[Delivered, Cancelled, Delivered]).unwrap(),
            Delivered
        );
    }

    #[test]
    fn test_aggregate_all_cancelled() {
        assert_eq!(aggregate_status(&[Cancelled, Cancelled]).unwrap(), Cancelled);
        assert_eq!(aggregate_status(&[]), Err(OrderError::NoItems));
    }

    #[test]
    fn test_customer_cancellation() {
        assert!(ensure_cancellable_by_customer(Pending).is_ok());
        assert!(ensure_cancellable_by_customer(Confirmed).is_ok());
        assert_eq!(
            ensure_cancellable_by_customer(Processing),
            Err(OrderError::NotCancellable(Processing))
        );
    }

    #[test]
    fn test_order_number_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        assert_eq!(order_number(OrderId::new(42), at), "WS-20240315-000042");
    }
}
