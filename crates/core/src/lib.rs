//! Wellspring Core - domain types and business rules.
//!
//! This crate is shared by every Wellspring component:
//! - `storefront` - JSON API for customers, vendors and admins
//! - `cli` - Command-line tools for migrations and maintenance
//!
//! # Architecture
//!
//! The core crate holds types and pure rules only - no I/O, no database
//! access, no HTTP clients. Repositories and services in the storefront load
//! rows, hand them to these functions, and persist whatever comes back.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, money helpers, and status enums
//! - [`order`] - Order status transitions and item-to-order aggregation
//! - [`pricing`] - Cart quotes with jar deposits, discounts and delivery
//! - [`promo`] - Promo code normalisation and evaluation
//! - [`commission`] - Commission settlement at delivery time
//! - [`payout`] - Vendor balances and payout request rules
//! - [`review`] - Review validation, moderation and rating summaries
//! - [`tracker`] - Water-intake goals, summaries and streaks
//! - [`subscription`] - Recurring delivery scheduling
//! - [`settings`] - Runtime store settings
//! - [`pagination`] - Page parameters and paginated results
//! - [`text`] - Input sanitisation and slugs

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod commission;
pub mod order;
pub mod pagination;
pub mod payout;
pub mod pricing;
pub mod promo;
pub mod review;
pub mod settings;
pub mod subscription;
pub mod text;
pub mod tracker;
pub mod types;

pub use pagination::{PageParams, Paginated};
pub use settings::StoreSettings;
pub use types::*;
