//! Mail transport — SMTP via lettre for outbound, IMAP polling for inbound.

pub mod inbound;

use std::sync::Mutex;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::error::TransportError;

/// Outbound mail delivery boundary.
///
/// Returns the provider message id on success so the outbox can record it.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, TransportError>;
}

// ── SMTP mailer ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

/// SMTP mailer backed by lettre's blocking transport.
///
/// lettre's `SmtpTransport` is synchronous, so sends run in
/// `spawn_blocking` to keep the runtime free.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn send_blocking(
        config: &SmtpConfig,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, TransportError> {
        let creds = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let transport = SmtpTransport::relay(&config.host)
            .map_err(|e| TransportError::SendFailed(format!("SMTP relay error: {e}")))?
            .port(config.port)
            .credentials(creds)
            .build();

        let domain = config
            .from_address
            .rsplit('@')
            .next()
            .unwrap_or("localhost");
        let message_id = format!("<{}@{}>", Uuid::new_v4(), domain);

        let email = Message::builder()
            .from(config.from_address.parse().map_err(|e| {
                TransportError::InvalidAddress {
                    address: config.from_address.clone(),
                    reason: format!("{e}"),
                }
            })?)
            .to(recipient.parse().map_err(|e| TransportError::InvalidAddress {
                address: recipient.to_string(),
                reason: format!("{e}"),
            })?)
            .subject(subject)
            .message_id(Some(message_id.clone()))
            .body(body.to_string())
            .map_err(|e| TransportError::BuildFailed(format!("{e}")))?;

        transport
            .send(&email)
            .map_err(|e| TransportError::SendFailed(format!("SMTP send failed: {e}")))?;

        tracing::info!(recipient, "Email sent");
        Ok(message_id)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, TransportError> {
        let config = self.config.clone();
        let recipient = recipient.to_string();
        let subject = subject.to_string();
        let body = body.to_string();

        tokio::task::spawn_blocking(move || {
            Self::send_blocking(&config, &recipient, &subject, &body)
        })
        .await
        .map_err(|e| TransportError::SendFailed(format!("Send task panicked: {e}")))?
    }
}

// ── In-memory mailer (tests) ────────────────────────────────────────

/// A sent email recorded by `MemoryMailer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEmail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Records sends instead of delivering them. Can be told to fail.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<RecordedEmail>>,
    fail_with: Mutex<Option<String>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with `reason`.
    pub fn fail_next_sends(&self, reason: &str) {
        *self.fail_with.lock().unwrap() = Some(reason.to_string());
    }

    /// Stop failing sends.
    pub fn succeed_again(&self) {
        *self.fail_with.lock().unwrap() = None;
    }

    pub fn sent(&self) -> Vec<RecordedEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, TransportError> {
        if let Some(reason) = self.fail_with.lock().unwrap().clone() {
            return Err(TransportError::SendFailed(reason));
        }
        self.sent.lock().unwrap().push(RecordedEmail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(format!("<{}@memory>", Uuid::new_v4()))
    }
}
