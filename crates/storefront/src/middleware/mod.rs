//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transactions)
//! 2. Security headers
//! 3. `TraceLayer` (request span and logs)
//! 4. Request ID (honour or generate, recorded on the span, echoed back)
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Rate limiting (governor), per route group
//!
//! Role checks are extractors rather than layers, see [`auth`] and [`cron`].

pub mod auth;
pub mod cron;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalAuth, RequireAdmin, RequireAuth, RequireVendor, clear_current_user, set_current_user,
};
pub use cron::CronAuth;
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::{RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
