//! Saved delivery addresses.
//!
//! A user always has exactly one default address once they have any; the
//! repository keeps that true across create, update and delete.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use validator::Validate;

use wellspring_core::AddressId;
use wellspring_core::text::{sanitize_optional, sanitize_text};

use crate::db::AddressRepository;
use crate::db::addresses::{Address, AddressFields, AddressUpdate};
use crate::error::{AppError, FieldError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// New address.
#[derive(Debug, Deserialize, Validate)]
pub struct AddressRequest {
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub label: Option<String>,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub recipient_name: String,
    #[validate(length(min = 5, max = 30, message = "must be 5-30 characters"))]
    pub phone: String,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub line1: String,
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub city: String,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub region: Option<String>,
    #[validate(length(max = 20, message = "must be at most 20 characters"))]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// Partial address update.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AddressPatch {
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub label: Option<String>,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub recipient_name: Option<String>,
    #[validate(length(min = 5, max = 30, message = "must be 5-30 characters"))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 200, message = "must be 1-200 characters"))]
    pub line1: Option<String>,
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub city: Option<String>,
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub region: Option<String>,
    #[validate(length(max = 20, message = "must be at most 20 characters"))]
    pub postal_code: Option<String>,
    pub is_default: Option<bool>,
}

/// Sanitise a required field, rejecting input that is blank afterwards.
fn required(field: &str, value: &str) -> Result<String> {
    let clean = sanitize_text(value);
    if clean.is_empty() {
        return Err(AppError::Validation(vec![FieldError::new(field, "cannot be empty")]));
    }
    Ok(clean)
}

fn required_opt(field: &str, value: Option<&str>) -> Result<Option<String>> {
    value.map(|v| required(field, v)).transpose()
}

/// `GET /api/addresses`
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Address>>> {
    Ok(Json(AddressRepository::new(state.pool()).list(user.id).await?))
}

/// `POST /api/addresses`
///
/// # Errors
///
/// Returns 400 for invalid input.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddressRequest>,
) -> Result<(StatusCode, Json<Address>)> {
    body.validate()?;

    let fields = AddressFields {
        label: sanitize_optional(body.label.as_deref()),
        recipient_name: required("recipient_name", &body.recipient_name)?,
        phone: required("phone", &body.phone)?,
        line1: required("line1", &body.line1)?,
        line2: sanitize_optional(body.line2.as_deref()),
        city: required("city", &body.city)?,
        region: sanitize_optional(body.region.as_deref()),
        postal_code: sanitize_optional(body.postal_code.as_deref()),
    };

    let address = AddressRepository::new(state.pool())
        .create(user.id, fields, body.is_default)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// `PATCH /api/addresses/{id}`
///
/// # Errors
///
/// Returns 404 if the address is not the user's.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
    Json(body): Json<AddressPatch>,
) -> Result<Json<Address>> {
    body.validate()?;

    let changes = AddressUpdate {
        label: sanitize_optional(body.label.as_deref()),
        recipient_name: required_opt("recipient_name", body.recipient_name.as_deref())?,
        phone: required_opt("phone", body.phone.as_deref())?,
        line1: required_opt("line1", body.line1.as_deref())?,
        line2: sanitize_optional(body.line2.as_deref()),
        city: required_opt("city", body.city.as_deref())?,
        region: sanitize_optional(body.region.as_deref()),
        postal_code: sanitize_optional(body.postal_code.as_deref()),
        is_default: body.is_default,
    };

    let address = AddressRepository::new(state.pool())
        .update(user.id, id, changes)
        .await?;
    Ok(Json(address))
}

/// `POST /api/addresses/{id}/default`
///
/// # Errors
///
/// Returns 404 if the address is not the user's.
pub async fn make_default(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>> {
    Ok(Json(
        AddressRepository::new(state.pool())
            .set_default(user.id, id)
            .await?,
    ))
}

/// `DELETE /api/addresses/{id}`
///
/// # Errors
///
/// Returns 404 if the address is not the user's and 409 while a
/// subscription delivers to it.
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    AddressRepository::new(state.pool())
        .delete(user.id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_blank_after_sanitising() {
        assert_eq!(required("city", "  Austin ").unwrap(), "Austin");
        assert!(required("city", " <> ").is_err());
        assert_eq!(required_opt("city", None).unwrap(), None);
    }

    #[test]
    fn test_address_request_validation() {
        let body: AddressRequest = serde_json::from_value(serde_json::json!({
            "recipient_name": "Ada",
            "phone": "12",
            "line1": "1 Spring St",
            "city": "Austin"
        }))
        .unwrap();
        let errors = body.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("phone"));
        assert!(!body.is_default);
    }
}
