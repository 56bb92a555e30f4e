//! Cart quotes, checkout and the customer's order history.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use validator::Validate;

use wellspring_core::pricing::Quote;
use wellspring_core::text::sanitize_optional;
use wellspring_core::{AddressId, OrderId, OrderStatus, PageParams, Paginated, PaymentMethod};

use crate::db::OrderRepository;
use crate::db::orders::{Order, OrderDetail};
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::orders::{CartItem, CheckoutInput, CheckoutOutcome, OrderService};
use crate::state::AppState;

/// `POST /api/cart/quote`
#[derive(Debug, Deserialize, Validate)]
pub struct QuoteRequest {
    #[validate(length(min = 1, max = 50, message = "must contain 1-50 items"))]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub returned_jars: u32,
    pub promo_code: Option<String>,
}

/// `POST /api/orders`
#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 50, message = "must contain 1-50 items"))]
    pub items: Vec<CartItem>,
    pub address_id: AddressId,
    pub payment_method: PaymentMethod,
    pub promo_code: Option<String>,
    #[serde(default)]
    pub returned_jars: u32,
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub notes: Option<String>,
}

/// `?status=` on the order list.
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
}

/// `POST /api/orders/{id}/cancel`
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CancelRequest {
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// Price a cart without reserving stock.
///
/// # Errors
///
/// Returns 400 for a malformed cart and 409 if a product is unavailable.
pub async fn quote(
    State(state): State<AppState>,
    Json(body): Json<QuoteRequest>,
) -> Result<Json<Quote>> {
    body.validate()?;
    let quote = OrderService::new(&state)
        .quote(&body.items, body.returned_jars, body.promo_code.as_deref())
        .await?;
    Ok(Json(quote))
}

/// Place an order.
///
/// # Errors
///
/// Returns 409 when stock runs out, 503 during maintenance and 502 if the
/// payment gateway fails.
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutOutcome>)> {
    body.validate()?;

    let outcome = OrderService::new(&state)
        .checkout(
            &user,
            CheckoutInput {
                items: body.items,
                address_id: body.address_id,
                payment_method: body.payment_method,
                promo_code: body.promo_code,
                returned_jars: body.returned_jars,
                notes: sanitize_optional(body.notes.as_deref()),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// The customer's orders, newest first.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<OrderListQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Paginated<Order>>> {
    let (orders, total) = OrderRepository::new(state.pool())
        .list_for_user(user.id, query.status, page)
        .await?;
    Ok(Json(Paginated::new(orders, page, total)))
}

/// One of the customer's orders with its items.
///
/// # Errors
///
/// Returns 404 if the order does not exist or belongs to someone else.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let order = OrderRepository::new(state.pool())
        .get_detail(id, Some(user.id))
        .await?;
    Ok(Json(order))
}

/// Cancel an order that has not started processing.
///
/// # Errors
///
/// Returns 404 if it is not the customer's and 409 once processing started.
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<OrderDetail>> {
    let Json(body) = body.unwrap_or_default();
    body.validate()?;
    let reason = sanitize_optional(body.reason.as_deref());

    let order = OrderService::new(&state)
        .cancel_by_customer(user.id, id, reason.as_deref())
        .await?;
    Ok(Json(order))
}
