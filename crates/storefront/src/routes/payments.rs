//! Payment gateway webhook.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde_json::{Value, json};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::services::orders::OrderService;
use crate::services::payments::{PaymentError, SIGNATURE_HEADER, WebhookEvent};
use crate::state::AppState;

/// `POST /api/payments/webhook`
///
/// The signature covers the raw body, so the body is read as bytes and only
/// parsed after it verifies. Replays of an event already applied answer 200
/// with `"applied": false`.
///
/// # Errors
///
/// Returns 404 when no gateway is configured, 401 for a bad signature and
/// 400 for a malformed payload.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>)> {
    let Some(client) = state.payments() else {
        return Err(AppError::NotFound("payment gateway".to_string()));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(PaymentError::InvalidSignature)?;

    if let Err(e) = client.verify_webhook(&body, signature) {
        tracing::warn!("Rejected payment webhook: {}", e);
        return Err(e.into());
    }

    let event = WebhookEvent::parse(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid webhook payload: {e}")))?;
    add_breadcrumb(
        "payment",
        "Webhook verified",
        Some(&[("reference", event.data.reference.as_str())]),
    );

    let applied = OrderService::new(&state).apply_payment_event(&event).await?;
    Ok((StatusCode::OK, Json(json!({ "applied": applied }))))
}
