//! In-process tests of the HTTP stack.
//!
//! Every request here is answered before a handler needs the database, so
//! the app runs over a lazy pool that is never connected.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use tower::ServiceExt;

use wellspring_integration_tests::{
    CLIENT_IP, CRON_SECRET, WEBHOOK_SECRET, sign, test_app, test_config, with_payments,
};

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// =============================================================================
// Health and middleware
// =============================================================================

#[tokio::test]
async fn test_health_is_ok() {
    let response = test_app(test_config()).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = test_app(test_config());

    for uri in ["/health", "/api/auth/me", "/no-such-route"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers["x-frame-options"], "DENY", "{uri}");
        assert_eq!(headers["x-content-type-options"], "nosniff", "{uri}");
        assert_eq!(headers["cache-control"], "no-store, max-age=0", "{uri}");
        assert!(headers.contains_key("content-security-policy"), "{uri}");
    }
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let app = test_app(test_config());

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "edge-7f3a")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "edge-7f3a");

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "bad id with spaces")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert_ne!(generated, "bad id with spaces");
    assert!(uuid::Uuid::parse_str(generated).is_ok());
}

// =============================================================================
// Auth extractors and validation
// =============================================================================

#[tokio::test]
async fn test_protected_routes_require_login() {
    let app = test_app(test_config());

    for uri in [
        "/api/auth/me",
        "/api/orders",
        "/api/addresses",
        "/api/tracker/summary",
        "/api/vendor/balance",
        "/api/admin/users",
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        let body = json_body(response).await;
        assert!(body["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_register_validation_reports_fields() {
    let response = test_app(test_config())
        .oneshot(post_json(
            "/api/auth/register",
            &json!({ "email": "not-an-email", "password": "long enough pass", "name": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"name"));
}

#[tokio::test]
async fn test_quote_rejects_empty_cart() {
    let response = test_app(test_config())
        .oneshot(post_json("/api/cart/quote", &json!({ "items": [] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let app = test_app(test_config());
    let malformed = json!({ "email": 42 });

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(post_json("/api/auth/login", &malformed))
            .await
            .unwrap();
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    let response = app
        .oneshot(post_json("/api/auth/login", &malformed))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

// =============================================================================
// Cron
// =============================================================================

#[tokio::test]
async fn test_cron_requires_bearer_token() {
    let app = test_app(test_config());

    let request = Request::builder()
        .method("POST")
        .uri("/api/cron/cleanup")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("POST")
        .uri("/api/cron/cleanup")
        .header(header::AUTHORIZATION, format!("Bearer {CRON_SECRET}x"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Invalid cron token");
}

// =============================================================================
// Payment webhook
// =============================================================================

fn webhook(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("x-payment-signature", signature);
    }
    builder.body(Body::from(body.to_owned())).unwrap()
}

#[tokio::test]
async fn test_webhook_without_gateway_is_not_found() {
    let body = r#"{"event":"payment.succeeded","data":{"reference":"WS-1"}}"#;
    let response = test_app(test_config())
        .oneshot(webhook(body, Some(&sign(WEBHOOK_SECRET, body.as_bytes()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_rejects_bad_signatures() {
    let app = test_app(with_payments(test_config()));
    let body = r#"{"event":"payment.succeeded","data":{"reference":"WS-1"}}"#;

    let response = app.clone().oneshot(webhook(body, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let forged = sign("another-secret-entirely-0123456789", body.as_bytes());
    let response = app.clone().oneshot(webhook(body, Some(&forged))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Signature over a different body
    let signature = sign(WEBHOOK_SECRET, b"{}");
    let response = app.oneshot(webhook(body, Some(&signature))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_rejects_malformed_payload_after_verifying() {
    let body = r#"{"event":"payment.succeeded"}"#;
    let signature = sign(WEBHOOK_SECRET, body.as_bytes()).to_uppercase();

    let response = test_app(with_payments(test_config()))
        .oneshot(webhook(body, Some(&signature)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
