//! Shared-secret guard for scheduler-triggered endpoints.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde_json::json;

use crate::services::payments::constant_time_compare;
use crate::state::AppState;

/// Extractor that requires `Authorization: Bearer <CRON_SECRET>`.
pub struct CronAuth;

/// Rejection for a missing or wrong cron token.
#[derive(Debug)]
pub struct CronRejection;

impl IntoResponse for CronRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid cron token" })),
        )
            .into_response()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

impl FromRequestParts<AppState> for CronAuth {
    type Rejection = CronRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(CronRejection)?;
        let expected = state.config().cron_secret.expose_secret();

        if constant_time_compare(token, expected) {
            Ok(Self)
        } else {
            tracing::warn!("Rejected cron request with a bad token");
            Err(CronRejection)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/cron/cleanup");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}
