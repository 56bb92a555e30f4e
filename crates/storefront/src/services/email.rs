//! Transactional email.
//!
//! Uses SMTP via lettre with Askama HTML and plain-text templates. Sends run
//! on a spawned task; a failed send is logged and never reaches the caller.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

/// One line of an order confirmation.
#[derive(Debug, Clone)]
pub struct EmailLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    store_name: &'a str,
    name: &'a str,
    order_number: &'a str,
    lines: &'a [EmailLine],
    total: Decimal,
    currency: &'a str,
    payment_method: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    store_name: &'a str,
    name: &'a str,
    order_number: &'a str,
    lines: &'a [EmailLine],
    total: Decimal,
    currency: &'a str,
    payment_method: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_status.html")]
struct OrderStatusHtml<'a> {
    store_name: &'a str,
    name: &'a str,
    order_number: &'a str,
    status: &'a str,
    reason: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/order_status.txt")]
struct OrderStatusText<'a> {
    store_name: &'a str,
    name: &'a str,
    order_number: &'a str,
    status: &'a str,
    reason: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/payout_update.html")]
struct PayoutUpdateHtml<'a> {
    store_name: &'a str,
    business_name: &'a str,
    amount: Decimal,
    status: &'a str,
    note: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "email/payout_update.txt")]
struct PayoutUpdateText<'a> {
    store_name: &'a str,
    business_name: &'a str,
    amount: Decimal,
    status: &'a str,
    note: Option<&'a str>,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A message waiting to be rendered and sent.
#[derive(Debug, Clone)]
pub enum EmailJob {
    OrderConfirmation {
        to: String,
        name: String,
        order_number: String,
        lines: Vec<EmailLine>,
        total: Decimal,
        currency: String,
        payment_method: String,
    },
    OrderStatus {
        to: String,
        name: String,
        order_number: String,
        status: String,
        reason: Option<String>,
    },
    PayoutUpdate {
        to: String,
        business_name: String,
        amount: Decimal,
        status: String,
        note: Option<String>,
    },
}

impl EmailJob {
    const fn kind(&self) -> &'static str {
        match self {
            Self::OrderConfirmation { .. } => "order_confirmation",
            Self::OrderStatus { .. } => "order_status",
            Self::PayoutUpdate { .. } => "payout_update",
        }
    }

    /// Render to `(to, subject, text, html)`.
    fn render(&self, store_name: &str) -> Result<(String, String, String, String), EmailError> {
        match self {
            Self::OrderConfirmation {
                to,
                name,
                order_number,
                lines,
                total,
                currency,
                payment_method,
            } => {
                let html = OrderConfirmationHtml {
                    store_name,
                    name,
                    order_number,
                    lines,
                    total: *total,
                    currency,
                    payment_method,
                }
                .render()?;
                let text = OrderConfirmationText {
                    store_name,
                    name,
                    order_number,
                    lines,
                    total: *total,
                    currency,
                    payment_method,
                }
                .render()?;
                let subject = format!("{store_name}: order {order_number} received");
                Ok((to.clone(), subject, text, html))
            }
            Self::OrderStatus {
                to,
                name,
                order_number,
                status,
                reason,
            } => {
                let reason = reason.as_deref();
                let html = OrderStatusHtml {
                    store_name,
                    name,
                    order_number,
                    status,
                    reason,
                }
                .render()?;
                let text = OrderStatusText {
                    store_name,
                    name,
                    order_number,
                    status,
                    reason,
                }
                .render()?;
                let subject = format!("{store_name}: order {order_number} is {status}");
                Ok((to.clone(), subject, text, html))
            }
            Self::PayoutUpdate {
                to,
                business_name,
                amount,
                status,
                note,
            } => {
                let note = note.as_deref();
                let html = PayoutUpdateHtml {
                    store_name,
                    business_name,
                    amount: *amount,
                    status,
                    note,
                }
                .render()?;
                let text = PayoutUpdateText {
                    store_name,
                    business_name,
                    amount: *amount,
                    status,
                    note,
                }
                .render()?;
                let subject = format!("{store_name}: payout {status}");
                Ok((to.clone(), subject, text, html))
            }
        }
    }
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Render and send a job on a background task.
    pub fn dispatch(&self, job: EmailJob, store_name: String) {
        let service = self.clone();
        tokio::spawn(async move {
            let kind = job.kind();
            if let Err(e) = service.send(&job, &store_name).await {
                tracing::warn!(kind, error = %e, "Failed to send email");
            }
        });
    }

    /// Render and send a job, waiting for the SMTP exchange.
    ///
    /// # Errors
    ///
    /// Returns error if rendering, addressing or delivery fails.
    pub async fn send(&self, job: &EmailJob, store_name: &str) -> Result<(), EmailError> {
        let (to, subject, text, html) = job.render(store_name)?;
        self.send_multipart_email(&to, &subject, &text, &html).await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_confirmation_renders_lines() {
        let job = EmailJob::OrderConfirmation {
            to: "ada@example.com".to_owned(),
            name: "Ada".to_owned(),
            order_number: "WS-20261019-000042".to_owned(),
            lines: vec![EmailLine {
                name: "Spring Water 19L".to_owned(),
                quantity: 2,
                unit_price: Decimal::new(850, 2),
            }],
            total: Decimal::new(2700, 2),
            currency: "USD".to_owned(),
            payment_method: "cod".to_owned(),
        };

        let (to, subject, text, html) = job.render("Wellspring").unwrap();
        assert_eq!(to, "ada@example.com");
        assert!(subject.contains("WS-20261019-000042"));
        assert!(text.contains("Spring Water 19L x 2 @ 8.50"));
        assert!(text.contains("Total: 27.00 USD"));
        assert!(html.contains("Thanks for your order, Ada!"));
    }

    #[test]
    fn test_order_status_optional_reason() {
        let mut job = EmailJob::OrderStatus {
            to: "ada@example.com".to_owned(),
            name: "Ada".to_owned(),
            order_number: "WS-1".to_owned(),
            status: "cancelled".to_owned(),
            reason: None,
        };
        let (_, subject, text, _) = job.render("Wellspring").unwrap();
        assert_eq!(subject, "Wellspring: order WS-1 is cancelled");
        assert!(!text.contains("Reason:"));

        if let EmailJob::OrderStatus { reason, .. } = &mut job {
            *reason = Some("out of stock".to_owned());
        }
        let (_, _, text, html) = job.render("Wellspring").unwrap();
        assert!(text.contains("Reason: out of stock"));
        assert!(html.contains("out of stock"));
    }

    #[test]
    fn test_payout_update_html_escapes() {
        let job = EmailJob::PayoutUpdate {
            to: "vendor@example.com".to_owned(),
            business_name: "Clear & Cold".to_owned(),
            amount: Decimal::new(12000, 2),
            status: "paid".to_owned(),
            note: None,
        };
        let (_, subject, text, html) = job.render("Wellspring").unwrap();
        assert_eq!(subject, "Wellspring: payout paid");
        assert!(text.contains("Clear & Cold"));
        assert!(html.contains("Clear &amp; Cold") || html.contains("Clear &#38; Cold"));
        assert!(html.contains("120.00"));
    }
}
