//! Authentication route handlers.
//!
//! Email and password accounts backed by a server-side session. Every
//! successful login or registration issues a fresh session ID.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use validator::Validate;

use wellspring_core::text::sanitize_text;

use crate::db::UserRepository;
use crate::db::users::User;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Registration request.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: String,
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Create a customer account and log it in.
///
/// # Errors
///
/// Returns 400 for invalid input and 409 if the email is taken.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    body.validate()?;
    let name = sanitize_text(&body.name);
    if name.is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let user = AuthService::new(state.pool())
        .register(&body.email, &body.password, &name)
        .await?;

    start_session(&session, &user).await?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in with email and password.
///
/// # Errors
///
/// Returns 401 for unknown emails and wrong passwords alike.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<User>> {
    let user = match AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Login failed: {}", e);
            return Err(e.into());
        }
    };

    start_session(&session, &user).await?;
    Ok(Json(user))
}

/// End the session.
///
/// # Errors
///
/// Returns 500 if the session store fails.
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session: {e}")))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in user's account.
///
/// # Errors
///
/// Returns 401 if the account no longer exists.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
    Ok(Json(user))
}

async fn start_session(session: &Session, user: &User) -> Result<()> {
    set_current_user(session, &CurrentUser::from(user))
        .await
        .map_err(|e| AppError::Internal(format!("session: {e}")))?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}
