//! Recurring delivery subscriptions.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;

use wellspring_core::subscription::SubscriptionAction;
use wellspring_core::{AddressId, ProductId, SubscriptionFrequency, SubscriptionId};

use crate::db::SubscriptionRepository;
use crate::db::subscriptions::Subscription;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::subscriptions::{SubscriptionChange, SubscriptionInput, SubscriptionService};
use crate::state::AppState;

/// New subscription.
#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    pub product_id: ProductId,
    pub address_id: AddressId,
    pub quantity: u32,
    pub frequency: SubscriptionFrequency,
    /// First delivery; defaults to one cycle from today.
    pub start_date: Option<NaiveDate>,
}

/// Status action and/or plan changes.
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionPatch {
    pub action: Option<SubscriptionAction>,
    pub quantity: Option<u32>,
    pub frequency: Option<SubscriptionFrequency>,
}

/// `GET /api/subscriptions`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Subscription>>> {
    Ok(Json(SubscriptionRepository::new(state.pool()).list(user.id).await?))
}

/// `POST /api/subscriptions`
///
/// # Errors
///
/// Returns 400 for an invalid quantity or date and 404 if the product or
/// address is unknown.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<SubscriptionRequest>,
) -> Result<(StatusCode, Json<Subscription>)> {
    let subscription = SubscriptionService::new(&state)
        .create(
            user.id,
            SubscriptionInput {
                product_id: body.product_id,
                address_id: body.address_id,
                quantity: body.quantity,
                frequency: body.frequency,
                start_date: body.start_date,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// `PATCH /api/subscriptions/{id}`
///
/// # Errors
///
/// Returns 404 if it is not the user's and 409 for a disallowed action.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<SubscriptionId>,
    Json(body): Json<SubscriptionPatch>,
) -> Result<Json<Subscription>> {
    let subscription = SubscriptionService::new(&state)
        .update(
            user.id,
            id,
            SubscriptionChange {
                action: body.action,
                quantity: body.quantity,
                frequency: body.frequency,
            },
        )
        .await?;
    Ok(Json(subscription))
}
