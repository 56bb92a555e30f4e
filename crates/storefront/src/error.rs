//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`;
//! the body is always JSON: `{"error": "..."}`, plus `"fields"` for
//! validation failures.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use wellspring_core::commission::InvalidRate;
use wellspring_core::order::OrderError;
use wellspring_core::payout::PayoutError;
use wellspring_core::pricing::PricingError;
use wellspring_core::promo::PromoError;
use wellspring_core::review::ReviewError;
use wellspring_core::settings::SettingsError;
use wellspring_core::subscription::SubscriptionError;
use wellspring_core::tracker::TrackerError;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::payments::PaymentError;

/// One invalid input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Payment gateway call failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Request body or query failed validation.
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// User is not authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The request conflicts with current state.
    #[error("{0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Store is in maintenance mode.
    #[error("The store is temporarily closed for maintenance")]
    Maintenance,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a [FieldError]>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::AccountNotFound => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::EmailTaken => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Payment(PaymentError::InvalidSignature) => StatusCode::UNAUTHORIZED,
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Maintenance => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to clients.
    fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Payment(PaymentError::InvalidSignature) => "Invalid signature".to_string(),
            Self::Payment(_) => "Payment service error".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::AccountNotFound => {
                    "Invalid email or password".to_string()
                }
                AuthError::EmailTaken => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_string()
                }
            },
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let fields = match &self {
            Self::Validation(fields) => Some(fields.as_slice()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.public_message(),
            fields,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(RepositoryError::Database(err))
    }
}

// =============================================================================
// Business rule errors
// =============================================================================

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NoItems => Self::BadRequest(err.to_string()),
            OrderError::InvalidTransition { .. } | OrderError::NotCancellable(_) => {
                Self::Conflict(err.to_string())
            }
        }
    }
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::Unavailable(_) | PricingError::InsufficientStock { .. } => {
                Self::Conflict(err.to_string())
            }
            PricingError::EmptyCart | PricingError::InvalidQuantity { .. } => {
                Self::BadRequest(err.to_string())
            }
        }
    }
}

impl From<PromoError> for AppError {
    fn from(err: PromoError) -> Self {
        Self::Validation(vec![FieldError::new("promo_code", err.to_string())])
    }
}

impl From<PayoutError> for AppError {
    fn from(err: PayoutError) -> Self {
        match err {
            PayoutError::AlreadyOpen | PayoutError::InvalidTransition { .. } => {
                Self::Conflict(err.to_string())
            }
            PayoutError::NonPositive
            | PayoutError::BelowMinimum(_)
            | PayoutError::ExceedsAvailable(_) => {
                Self::Validation(vec![FieldError::new("amount", err.to_string())])
            }
        }
    }
}

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::NotPurchased => Self::Forbidden(err.to_string()),
            ReviewError::AlreadyReviewed | ReviewError::InvalidTransition { .. } => {
                Self::Conflict(err.to_string())
            }
            ReviewError::InvalidRating => {
                Self::Validation(vec![FieldError::new("rating", err.to_string())])
            }
            ReviewError::TitleTooLong => {
                Self::Validation(vec![FieldError::new("title", err.to_string())])
            }
            ReviewError::CommentTooLong => {
                Self::Validation(vec![FieldError::new("comment", err.to_string())])
            }
        }
    }
}

impl From<TrackerError> for AppError {
    fn from(err: TrackerError) -> Self {
        let field = match err {
            TrackerError::InvalidAmount => "amount_ml",
            TrackerError::InvalidGoal => "daily_goal_ml",
            TrackerError::InvalidWeight => "weight_kg",
            TrackerError::InvalidReminderInterval => "reminder_interval_minutes",
            TrackerError::InvalidRange => "days",
        };
        Self::Validation(vec![FieldError::new(field, err.to_string())])
    }
}

impl From<SubscriptionError> for AppError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::InvalidTransition { .. } => Self::Conflict(err.to_string()),
            SubscriptionError::InvalidQuantity(_) => {
                Self::Validation(vec![FieldError::new("quantity", err.to_string())])
            }
            SubscriptionError::StartNotInFuture | SubscriptionError::DateOutOfRange => {
                Self::Validation(vec![FieldError::new("start_date", err.to_string())])
            }
        }
    }
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        Self::Validation(vec![FieldError::new(err.field, err.reason)])
    }
}

impl From<InvalidRate> for AppError {
    fn from(err: InvalidRate) -> Self {
        Self::Validation(vec![FieldError::new("commission_rate", err.to_string())])
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    FieldError::new(
                        field.to_string(),
                        e.message
                            .as_ref()
                            .map_or_else(|| format!("invalid {field}"), ToString::to_string),
                    )
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        Self::Validation(fields)
    }
}

// =============================================================================
// Sentry helpers
// =============================================================================

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("order", "Order placed", Some(&[("order_id", "42")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use wellspring_core::OrderStatus;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("order".to_string());
        assert_eq!(err.to_string(), "order not found");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(get_status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(get_status(AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(get_status(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(get_status(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(get_status(AppError::Maintenance), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            get_status(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors_map_to_status() {
        assert_eq!(get_status(RepositoryError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(RepositoryError::Conflict("taken".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::DataCorruption("bad".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_business_rule_errors_map_to_status() {
        assert_eq!(
            get_status(OrderError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Cancelled,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(OrderError::NoItems), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(PricingError::InsufficientStock {
                product: "Spring 20L".into(),
                available: 1,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(PromoError::Expired), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(PayoutError::AlreadyOpen), StatusCode::CONFLICT);
        assert_eq!(get_status(ReviewError::NotPurchased), StatusCode::FORBIDDEN);
        assert_eq!(get_status(TrackerError::InvalidAmount), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_payment_errors_map_to_status() {
        assert_eq!(get_status(PaymentError::InvalidSignature), StatusCode::UNAUTHORIZED);
        assert_eq!(
            get_status(PaymentError::Api {
                status: 500,
                message: "down".into(),
            }),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = AppError::Internal("connection string postgres://secret".into());
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Database(RepositoryError::DataCorruption("row 7".into()));
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_validation_error_lists_fields() {
        let err = AppError::from(TrackerError::InvalidGoal);
        let AppError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "daily_goal_ml");
    }
}
