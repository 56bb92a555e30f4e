//! Account route handlers.
//!
//! These routes require authentication.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use validator::Validate;

use wellspring_core::text::{sanitize_optional, sanitize_text};

use crate::db::UserRepository;
use crate::db::users::User;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Profile update.
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileRequest {
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 30, message = "must be at most 30 characters"))]
    pub phone: Option<String>,
}

/// Password change.
#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Update name and phone.
///
/// # Errors
///
/// Returns 400 for invalid input.
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<ProfileRequest>,
) -> Result<Json<User>> {
    body.validate()?;
    let name = sanitize_text(&body.name);
    if name.is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    let phone = sanitize_optional(body.phone.as_deref());

    let updated = UserRepository::new(state.pool())
        .update_profile(user.id, &name, phone.as_deref())
        .await?;
    Ok(Json(updated))
}

/// Change the password after checking the current one.
///
/// # Errors
///
/// Returns 401 if the current password is wrong and 400 if the new one is weak.
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<PasswordRequest>,
) -> Result<StatusCode> {
    AuthService::new(state.pool())
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;
    tracing::info!(user_id = %user.id, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}
