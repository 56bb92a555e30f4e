//! HTTP route handlers for the marketplace API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                         - Liveness
//! GET  /health/ready                   - Readiness (database)
//!
//! # Auth (strict rate limit)
//! POST /api/auth/register              - Create account and log in
//! POST /api/auth/login                 - Log in
//! POST /api/auth/logout                - Log out
//! GET  /api/auth/me                    - Current user
//!
//! # Account
//! PATCH /api/account                   - Update name and phone
//! POST  /api/account/password          - Change password
//! GET|POST /api/addresses              - List / create addresses
//! PATCH|DELETE /api/addresses/{id}     - Update / delete an address
//! POST  /api/addresses/{id}/default    - Make an address the default
//!
//! # Catalog
//! GET  /api/products                   - Filtered product listing
//! GET  /api/products/{slug}            - Product with rating summary
//! GET|POST /api/products/{slug}/reviews - Approved reviews / write a review
//! DELETE /api/reviews/{id}             - Delete own review
//! GET  /api/brands                     - Brand listing
//! GET  /api/brands/{slug}              - Brand with its products
//!
//! # Orders
//! POST /api/cart/quote                 - Price a cart
//! POST /api/promo-codes/validate       - Check a promo code
//! GET|POST /api/orders                 - Own orders / checkout
//! GET  /api/orders/{id}                - Order detail
//! POST /api/orders/{id}/cancel         - Cancel before processing
//! GET|POST /api/subscriptions          - Subscriptions
//! PATCH /api/subscriptions/{id}        - Pause, resume, cancel, change
//!
//! # Tracker
//! GET|PUT /api/tracker/settings        - Intake preferences
//! POST /api/tracker/logs               - Log intake
//! DELETE /api/tracker/logs/{id}        - Delete an entry
//! GET  /api/tracker/summary            - One day and the streak
//! GET  /api/tracker/history            - Daily totals
//!
//! # Vendor (approved vendors, except register)
//! POST /api/vendor/register            - Apply as a vendor
//! GET|POST /api/vendor/brands          - Own brands
//! GET|POST /api/vendor/products        - Own products
//! PATCH|DELETE /api/vendor/products/{id}
//! GET  /api/vendor/orders              - Own order items
//! PATCH /api/vendor/order-items/{id}/status
//! GET  /api/vendor/balance             - Earnings and payouts
//! GET|POST /api/vendor/payouts         - Payout requests
//!
//! # Admin
//! GET  /api/admin/users                - Users
//! PATCH /api/admin/users/{id}/role
//! GET  /api/admin/vendors              - Vendors
//! PATCH /api/admin/vendors/{id}        - Approve, set commission
//! GET  /api/admin/orders               - Orders
//! GET  /api/admin/orders/{id}
//! PATCH /api/admin/orders/{id}/status
//! GET  /api/admin/payouts              - Payout queue
//! PATCH /api/admin/payouts/{id}        - Approve, reject, mark paid
//! GET  /api/admin/reviews              - Moderation queue
//! PATCH /api/admin/reviews/{id}
//! GET|POST /api/admin/promo-codes
//! PATCH|DELETE /api/admin/promo-codes/{id}
//! GET|PUT /api/admin/settings
//! GET  /api/settings                   - Public settings
//!
//! # Machine callers (no rate limit, secret-authenticated)
//! POST /api/payments/webhook           - Gateway events (HMAC signature)
//! POST /api/cron/cleanup               - Cleanup job (bearer token)
//! ```

pub mod account;
pub mod addresses;
pub mod admin;
pub mod auth;
pub mod catalog;
pub mod cron;
pub mod orders;
pub mod payments;
pub mod promo_codes;
pub mod reviews;
pub mod settings;
pub mod subscriptions;
pub mod tracker;
pub mod vendor;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the login and registration router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter())
}

/// Create the account and address routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/account", patch(account::update_profile))
        .route("/account/password", post(account::change_password))
        .route("/addresses", get(addresses::list).post(addresses::create))
        .route(
            "/addresses/{id}",
            patch(addresses::update).delete(addresses::delete),
        )
        .route("/addresses/{id}/default", post(addresses::make_default))
}

/// Create the public catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(catalog::list_products))
        .route("/products/{slug}", get(catalog::show_product))
        .route(
            "/products/{slug}/reviews",
            get(reviews::list_for_product).post(reviews::create),
        )
        .route("/reviews/{id}", delete(reviews::delete))
        .route("/brands", get(catalog::list_brands))
        .route("/brands/{slug}", get(catalog::show_brand))
        .route("/settings", get(settings::public))
}

/// Create the cart, order and subscription routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/cart/quote", post(orders::quote))
        .route("/promo-codes/validate", post(promo_codes::validate))
        .route("/orders", get(orders::list).post(orders::checkout))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/cancel", post(orders::cancel))
        .route(
            "/subscriptions",
            get(subscriptions::list).post(subscriptions::create),
        )
        .route("/subscriptions/{id}", patch(subscriptions::update))
}

/// Create the tracker routes router.
pub fn tracker_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/settings",
            get(tracker::get_settings).put(tracker::update_settings),
        )
        .route("/logs", post(tracker::add_log))
        .route("/logs/{id}", delete(tracker::delete_log))
        .route("/summary", get(tracker::summary))
        .route("/history", get(tracker::history_view))
}

/// Create the vendor dashboard routes router.
pub fn vendor_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(vendor::register))
        .route(
            "/brands",
            get(vendor::list_brands).post(vendor::create_brand),
        )
        .route(
            "/products",
            get(vendor::list_products).post(vendor::create_product),
        )
        .route(
            "/products/{id}",
            patch(vendor::update_product).delete(vendor::delete_product),
        )
        .route("/orders", get(vendor::list_orders))
        .route(
            "/order-items/{id}/status",
            patch(vendor::update_item_status),
        )
        .route("/balance", get(vendor::balance))
        .route(
            "/payouts",
            get(vendor::list_payouts).post(vendor::request_payout),
        )
}

/// Create the admin dashboard routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}/role", patch(admin::set_user_role))
        .route("/vendors", get(admin::list_vendors))
        .route("/vendors/{id}", patch(admin::update_vendor))
        .route("/orders", get(admin::list_orders))
        .route("/orders/{id}", get(admin::show_order))
        .route("/orders/{id}/status", patch(admin::update_order_status))
        .route("/payouts", get(admin::list_payouts))
        .route("/payouts/{id}", patch(admin::decide_payout))
        .route("/reviews", get(reviews::admin_list))
        .route("/reviews/{id}", patch(reviews::moderate_review))
        .route(
            "/promo-codes",
            get(promo_codes::list).post(promo_codes::create),
        )
        .route(
            "/promo-codes/{id}",
            patch(promo_codes::update).delete(promo_codes::delete),
        )
        .route("/settings", get(settings::show).put(settings::update))
}

/// Routes called by the payment gateway and the scheduler.
pub fn machine_routes() -> Router<AppState> {
    Router::new()
        .route("/payments/webhook", post(payments::webhook))
        .route("/cron/cleanup", post(cron::cleanup))
}

/// Create all `/api` routes.
pub fn routes() -> Router<AppState> {
    let limited = Router::new()
        .merge(account_routes())
        .merge(catalog_routes())
        .merge(order_routes())
        .nest("/tracker", tracker_routes())
        .nest("/vendor", vendor_routes())
        .nest("/admin", admin_routes())
        .layer(api_rate_limiter());

    let api = Router::new()
        .nest("/auth", auth_routes())
        .merge(limited)
        .merge(machine_routes());

    Router::new().nest("/api", api)
}
