//! Session models for storefront.
//!
//! Database row types live next to their queries in [`crate::db`].

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
