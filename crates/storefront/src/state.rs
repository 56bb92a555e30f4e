//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::email::{EmailJob, EmailService};
use crate::services::payments::{PaymentClient, PaymentError};
use crate::services::settings::SettingsCache;

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment client: {0}")]
    Payment(#[from] PaymentError),
    #[error("email transport: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    settings: SettingsCache,
    payments: Option<PaymentClient>,
    email: Option<EmailService>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The payment client and mailer are built only when their config blocks
    /// are present.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured client fails to build.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let payments = config.payment.as_ref().map(PaymentClient::new).transpose()?;
        let email = config.email.as_ref().map(EmailService::new).transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                settings: SettingsCache::default(),
                payments,
                email,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Cached store settings.
    #[must_use]
    pub fn settings(&self) -> &SettingsCache {
        &self.inner.settings
    }

    /// Payment gateway client, if configured.
    #[must_use]
    pub fn payments(&self) -> Option<&PaymentClient> {
        self.inner.payments.as_ref()
    }

    /// Queue an email if SMTP is configured; otherwise drop it.
    pub fn send_email(&self, job: EmailJob, store_name: &str) {
        match &self.inner.email {
            Some(email) => email.dispatch(job, store_name.to_owned()),
            None => tracing::debug!("SMTP not configured, skipping email"),
        }
    }
}
