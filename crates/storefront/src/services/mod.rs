//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Registration, login and password changes
//! - `orders` - Checkout, status changes and payment webhooks
//! - `subscriptions` - Recurring deliveries
//! - `cron` - Periodic cleanup
//! - `payments` - Payment gateway client
//! - `email` - Transactional email
//! - `settings` - Cached store settings

pub mod auth;
pub mod cron;
pub mod email;
pub mod orders;
pub mod payments;
pub mod settings;
pub mod subscriptions;
