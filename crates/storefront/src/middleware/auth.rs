//! Authentication extractors.
//!
//! The session holds a [`CurrentUser`] written at login. `RequireVendor` and
//! `RequireAdmin` re-check the database on every request, so approvals and
//! demotions apply immediately even though the session copy is older.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;

use wellspring_core::{UserRole, VendorId};

use crate::db::{UserRepository, VendorRepository};
use crate::error::set_sentry_user;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires a logged-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(RequireAuth(user): RequireAuth) -> Json<CurrentUser> {
///     Json(user)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires an approved vendor account.
pub struct RequireVendor {
    pub user: CurrentUser,
    pub vendor_id: VendorId,
}

/// Extractor that requires an admin.
pub struct RequireAdmin(pub CurrentUser);

/// Why an auth extractor rejected the request.
#[derive(Debug)]
pub enum AuthRejection {
    /// Not logged in.
    Unauthorized,
    /// Logged in without the needed role.
    Forbidden(&'static str),
    /// The role check itself failed.
    Internal,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Authentication required"),
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn session_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = session_user(parts).await.ok_or(AuthRejection::Unauthorized)?;
        set_sentry_user(&user.id, Some(user.email.as_str()));
        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for RequireVendor {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        let vendor = VendorRepository::new(state.pool())
            .get_by_user(user.id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Vendor lookup failed");
                AuthRejection::Internal
            })?
            .ok_or(AuthRejection::Forbidden("Vendor account required"))?;

        if !vendor.is_approved {
            return Err(AuthRejection::Forbidden("Vendor account is awaiting approval"));
        }

        Ok(Self {
            user,
            vendor_id: vendor.id,
        })
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        let role = UserRepository::new(state.pool())
            .get_by_id(user.id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Admin lookup failed");
                AuthRejection::Internal
            })?
            .map(|u| u.role);

        match role {
            Some(UserRole::Admin) => Ok(Self(user)),
            Some(_) => Err(AuthRejection::Forbidden("Admin access required")),
            None => Err(AuthRejection::Unauthorized),
        }
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject anonymous requests.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts).await))
    }
}

/// Store the user in the session, issuing a fresh session ID.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Drop the whole session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be deleted.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    #[tokio::test]
    async fn test_require_auth_without_session_is_unauthorized() {
        let (mut parts, ()) = Request::builder().uri("/api/auth/me").body(()).unwrap().into_parts();
        let result = RequireAuth::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthRejection::Unauthorized)));
    }

    #[tokio::test]
    async fn test_optional_auth_without_session_is_none() {
        let (mut parts, ()) = Request::builder().uri("/api/products").body(()).unwrap().into_parts();
        let OptionalAuth(user) = OptionalAuth::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(user.is_none());
    }

    #[test]
    fn test_rejection_status() {
        assert_eq!(AuthRejection::Unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthRejection::Forbidden("no").into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
