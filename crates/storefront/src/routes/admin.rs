//! Admin dashboard API: users, vendors, orders and payouts.
//!
//! Review, promo code and settings management live with their own modules.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use wellspring_core::commission::validate_rate;
use wellspring_core::payout::{PayoutAction, apply_action};
use wellspring_core::text::sanitize_optional;
use wellspring_core::{
    OrderId, OrderStatus, PageParams, Paginated, PayoutId, PayoutStatus, UserId, UserRole, VendorId,
};

use crate::db::orders::{AdminOrderFilter, Order, OrderDetail};
use crate::db::payouts::Payout;
use crate::db::users::{User, UserFilter};
use crate::db::vendors::{Vendor, VendorUpdate, VendorWithOwner};
use crate::db::{OrderRepository, PayoutRepository, UserRepository, VendorRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::services::email::EmailJob;
use crate::services::orders::OrderService;
use crate::state::AppState;

/// `PATCH /api/admin/users/{id}/role`
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

/// `?approved=` on the vendor list.
#[derive(Debug, Default, Deserialize)]
pub struct VendorListQuery {
    pub approved: Option<bool>,
}

/// `PATCH /api/admin/vendors/{id}`
#[derive(Debug, Default, Deserialize)]
pub struct VendorPatch {
    pub is_approved: Option<bool>,
    pub commission_rate: Option<Decimal>,
}

/// `PATCH /api/admin/orders/{id}/status`
#[derive(Debug, Deserialize, Validate)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub reason: Option<String>,
}

/// `?status=` on the payout list.
#[derive(Debug, Default, Deserialize)]
pub struct PayoutListQuery {
    pub status: Option<PayoutStatus>,
}

/// `PATCH /api/admin/payouts/{id}`
#[derive(Debug, Deserialize, Validate)]
pub struct PayoutDecision {
    pub action: PayoutAction,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub note: Option<String>,
}

// =============================================================================
// Users
// =============================================================================

/// `GET /api/admin/users`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_users(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(filter): Query<UserFilter>,
    Query(page): Query<PageParams>,
) -> Result<Json<Paginated<User>>> {
    let (users, total) = UserRepository::new(state.pool()).list(&filter, page).await?;
    Ok(Json(Paginated::new(users, page, total)))
}

/// Change a user's role. Admins cannot demote themselves.
///
/// The user's open sessions keep the old role until they log in again;
/// vendor and admin checks re-read the role on every request.
///
/// # Errors
///
/// Returns 404 for unknown users and 400 for a self-demotion.
pub async fn set_user_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<User>> {
    if id == admin.id && body.role != UserRole::Admin {
        return Err(AppError::BadRequest("admins cannot change their own role".to_owned()));
    }

    let user = UserRepository::new(state.pool()).set_role(id, body.role).await?;
    tracing::info!(user_id = %id, role = %body.role, admin_id = %admin.id, "User role changed");
    Ok(Json(user))
}

// =============================================================================
// Vendors
// =============================================================================

/// `GET /api/admin/vendors`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_vendors(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<VendorListQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Paginated<VendorWithOwner>>> {
    let (vendors, total) = VendorRepository::new(state.pool())
        .list(query.approved, page)
        .await?;
    Ok(Json(Paginated::new(vendors, page, total)))
}

/// Approve a vendor or set its commission override.
///
/// # Errors
///
/// Returns 404 for unknown vendors and 400 for a rate outside 0-100.
pub async fn update_vendor(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<VendorId>,
    Json(body): Json<VendorPatch>,
) -> Result<Json<Vendor>> {
    if body.is_approved.is_none() && body.commission_rate.is_none() {
        return Err(AppError::BadRequest("nothing to change".to_owned()));
    }
    let commission_rate = body.commission_rate.map(validate_rate).transpose()?;

    let vendor = VendorRepository::new(state.pool())
        .update(
            id,
            VendorUpdate {
                is_approved: body.is_approved,
                commission_rate,
            },
        )
        .await?;

    tracing::info!(
        vendor_id = %id,
        is_approved = vendor.is_approved,
        admin_id = %admin.id,
        "Vendor updated"
    );
    Ok(Json(vendor))
}

// =============================================================================
// Orders
// =============================================================================

/// `GET /api/admin/orders`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(filter): Query<AdminOrderFilter>,
    Query(page): Query<PageParams>,
) -> Result<Json<Paginated<Order>>> {
    let (orders, total) = OrderRepository::new(state.pool())
        .list_admin(&filter, page)
        .await?;
    Ok(Json(Paginated::new(orders, page, total)))
}

/// `GET /api/admin/orders/{id}`
///
/// # Errors
///
/// Returns 404 for unknown orders.
pub async fn show_order(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(OrderRepository::new(state.pool()).get_detail(id, None).await?))
}

/// Move every item that can make the transition.
///
/// # Errors
///
/// Returns 404 for unknown orders and 409 if no item can move.
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<OrderStatusRequest>,
) -> Result<Json<OrderDetail>> {
    body.validate()?;
    let reason = sanitize_optional(body.reason.as_deref());

    let order = OrderService::new(&state)
        .change_order_status(id, body.status, reason.as_deref())
        .await?;
    tracing::info!(order_id = %id, status = %body.status, admin_id = %admin.id, "Order status changed by admin");
    Ok(Json(order))
}

// =============================================================================
// Payouts
// =============================================================================

/// `GET /api/admin/payouts`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list_payouts(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<PayoutListQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Paginated<Payout>>> {
    let (payouts, total) = PayoutRepository::new(state.pool())
        .list(query.status, page)
        .await?;
    Ok(Json(Paginated::new(payouts, page, total)))
}

/// Approve, reject or mark a payout paid, then tell the vendor.
///
/// # Errors
///
/// Returns 404 for unknown payouts and 409 for a disallowed action or a
/// concurrent change.
pub async fn decide_payout(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<PayoutId>,
    Json(body): Json<PayoutDecision>,
) -> Result<Json<Payout>> {
    body.validate()?;
    let note = sanitize_optional(body.note.as_deref());

    let payouts = PayoutRepository::new(state.pool());
    let current = payouts.get(id).await?;
    let next = apply_action(current.status, body.action)?;
    let payout = payouts
        .transition(id, current.status, next, note.as_deref())
        .await?;

    tracing::info!(
        payout_id = %id,
        vendor_id = %payout.vendor_id,
        status = %next,
        admin_id = %admin.id,
        "Payout updated"
    );

    match VendorRepository::new(state.pool())
        .get_with_owner(payout.vendor_id)
        .await
    {
        Ok(owner) => {
            let settings = state.settings().get(state.pool()).await?;
            state.send_email(
                EmailJob::PayoutUpdate {
                    to: owner.email.into_inner(),
                    business_name: payout.business_name.clone(),
                    amount: payout.amount,
                    status: next.to_string(),
                    note: payout.note.clone(),
                },
                &settings.store_name,
            );
        }
        Err(e) => tracing::warn!(payout_id = %id, "Payout email skipped: {}", e),
    }

    Ok(Json(payout))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payout_decision_parses_snake_case_actions() {
        let body: PayoutDecision =
            serde_json::from_str(r#"{"action": "mark_paid", "note": "wire 123"}"#).unwrap();
        assert_eq!(body.action, PayoutAction::MarkPaid);
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_order_status_reason_length() {
        let body = OrderStatusRequest {
            status: OrderStatus::Cancelled,
            reason: Some("x".repeat(501)),
        };
        assert!(body.validate().is_err());
    }
}
