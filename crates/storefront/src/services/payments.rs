//! Payment gateway client.
//!
//! Card orders open a hosted checkout session; the gateway later reports the
//! outcome through a signed webhook. Amounts cross the wire in minor units.

use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};

use wellspring_core::{CurrencyCode, to_minor_units};

use crate::config::PaymentConfig;

/// Header carrying the hex HMAC of the webhook body.
pub const SIGNATURE_HEADER: &str = "x-payment-signature";

/// Errors that can occur when talking to the gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response or webhook payload.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Amount cannot be expressed in minor units.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Webhook signature missing or wrong.
    #[error("Invalid webhook signature")]
    InvalidSignature,
}

/// A hosted checkout the customer is redirected to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub reference: String,
    pub checkout_url: String,
}

#[derive(Serialize)]
struct CheckoutRequest<'a> {
    reference: &'a str,
    amount: i64,
    currency: &'static str,
    email: &'a str,
    callback_url: &'a str,
}

#[derive(Serialize)]
struct RefundRequest<'a> {
    reference: &'a str,
    amount: i64,
}

/// Webhook event kinds the store reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum WebhookEventKind {
    #[serde(rename = "payment.succeeded")]
    Succeeded,
    #[serde(rename = "payment.failed")]
    Failed,
    #[serde(other)]
    Other,
}

/// Payload of a webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub reference: String,
    #[serde(default)]
    pub amount: Option<i64>,
}

/// A verified webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: WebhookEventKind,
    pub data: WebhookData,
}

impl WebhookEvent {
    /// Parse a raw webhook body.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Parse` for malformed JSON.
    pub fn parse(body: &[u8]) -> Result<Self, PaymentError> {
        serde_json::from_slice(body).map_err(|e| PaymentError::Parse(e.to_string()))
    }

    /// Whether the reported amount equals `total` in minor units.
    ///
    /// An event without an amount never matches.
    #[must_use]
    pub fn amount_matches(&self, total: Decimal) -> bool {
        self.data
            .amount
            .is_some_and(|amount| to_minor_units(total) == Some(amount))
    }
}

/// Gateway API client.
#[derive(Clone)]
pub struct PaymentClient {
    client: reqwest::Client,
    api_base: String,
    webhook_secret: SecretString,
    currency: CurrencyCode,
}

impl PaymentClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| PaymentError::Parse(format!("Invalid secret key format: {e}")))?,
        );
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            webhook_secret: config.webhook_secret.clone(),
            currency: config.currency,
        })
    }

    /// Open a checkout session for an order.
    ///
    /// # Errors
    ///
    /// Returns error if the amount is invalid or the request fails.
    #[instrument(skip_all, fields(reference = %reference))]
    pub async fn create_checkout(
        &self,
        reference: &str,
        amount: Decimal,
        email: &str,
        callback_url: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        let body = CheckoutRequest {
            reference,
            amount: minor_units(amount)?,
            currency: self.currency.code(),
            email,
            callback_url,
        };

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.api_base))
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: CheckoutSession = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        debug!(checkout_url = %session.checkout_url, "Checkout session created");
        Ok(session)
    }

    /// Refund a captured payment.
    ///
    /// # Errors
    ///
    /// Returns error if the amount is invalid or the request fails.
    #[instrument(skip_all, fields(reference = %reference))]
    pub async fn refund(&self, reference: &str, amount: Decimal) -> Result<(), PaymentError> {
        let body = RefundRequest {
            reference,
            amount: minor_units(amount)?,
        };

        let response = self
            .client
            .post(format!("{}/refunds", self.api_base))
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Refund accepted");
        Ok(())
    }

    /// Verify a webhook signature against the configured secret.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` on mismatch.
    pub fn verify_webhook(&self, body: &[u8], signature: &str) -> Result<(), PaymentError> {
        verify_signature(self.webhook_secret.expose_secret(), body, signature)
    }
}

fn minor_units(amount: Decimal) -> Result<i64, PaymentError> {
    match to_minor_units(amount) {
        Some(units) if units > 0 => Ok(units),
        _ => Err(PaymentError::InvalidAmount(amount)),
    }
}

/// Check a hex HMAC-SHA256 signature of `body`.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` on mismatch.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<(), PaymentError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::InvalidSignature)?;
    mac.update(body);

    let expected = hex::encode(mac.finalize().into_bytes());
    let provided = signature.trim().to_ascii_lowercase();

    if !constant_time_compare(&expected, &provided) {
        return Err(PaymentError::InvalidSignature);
    }
    Ok(())
}

/// Constant-time string comparison to prevent timing attacks.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_verify_signature_accepts_valid() {
        let body = br#"{"event":"payment.succeeded","data":{"reference":"WS-1"}}"#;
        let sig = sign("whsec", body);
        assert!(verify_signature("whsec", body, &sig).is_ok());
        assert!(verify_signature("whsec", body, &sig.to_uppercase()).is_ok());
    }

    #[test]
    fn test_verify_signature_rejects_tampering() {
        let body = br#"{"event":"payment.succeeded","data":{"reference":"WS-1"}}"#;
        let sig = sign("whsec", body);
        let tampered = br#"{"event":"payment.succeeded","data":{"reference":"WS-2"}}"#;
        assert!(verify_signature("whsec", tampered, &sig).is_err());
        assert!(verify_signature("other", body, &sig).is_err());
        assert!(verify_signature("whsec", body, "").is_err());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_webhook_event_parse() {
        let event = WebhookEvent::parse(
            br#"{"event":"payment.failed","data":{"reference":"WS-9","amount":1250}}"#,
        )
        .unwrap();
        assert_eq!(event.event, WebhookEventKind::Failed);
        assert_eq!(event.data.reference, "WS-9");
        assert_eq!(event.data.amount, Some(1250));

        let other =
            WebhookEvent::parse(br#"{"event":"charge.dispute","data":{"reference":"x"}}"#).unwrap();
        assert_eq!(other.event, WebhookEventKind::Other);

        assert!(WebhookEvent::parse(b"not json").is_err());
    }

    #[test]
    fn test_amount_matches_order_total() {
        let paid = WebhookEvent::parse(
            br#"{"event":"payment.succeeded","data":{"reference":"WS-3","amount":5000}}"#,
        )
        .unwrap();
        assert!(paid.amount_matches(Decimal::new(5000, 2)));
        assert!(!paid.amount_matches(Decimal::new(4999, 2)));

        let short = WebhookEvent::parse(
            br#"{"event":"payment.succeeded","data":{"reference":"WS-3","amount":1}}"#,
        )
        .unwrap();
        assert!(!short.amount_matches(Decimal::new(5000, 2)));

        let missing =
            WebhookEvent::parse(br#"{"event":"payment.succeeded","data":{"reference":"WS-3"}}"#)
                .unwrap();
        assert!(!missing.amount_matches(Decimal::new(5000, 2)));
    }

    #[test]
    fn test_minor_units_rejects_non_positive() {
        assert_eq!(minor_units(Decimal::new(1250, 2)).unwrap(), 1250);
        assert!(minor_units(Decimal::ZERO).is_err());
        assert!(minor_units(Decimal::new(-1, 0)).is_err());
    }
}
