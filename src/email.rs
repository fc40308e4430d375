//! Outbound mail delivery seam.
//!
//! The flow only needs `send(to, subject, body)`; delivery goes over SMTP in
//! production and to the log in local development, mirroring how template
//! rendering and transports stay outside the authentication core.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a message or return an error so the caller can report it.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Local dev mailer that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        info!(to_email = %to, subject = %subject, body = %body, "email send stub");
        Ok(())
    }
}

/// SMTP relay delivery.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a relay transport with credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay host or the `from` mailbox is invalid.
    pub fn new(
        host: &str,
        username: &str,
        password: &SecretString,
        from: &str,
    ) -> Result<Self> {
        let credentials =
            Credentials::new(username.to_string(), password.expose_secret().to_string());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .with_context(|| format!("invalid SMTP relay host: {host}"))?
            .credentials(credentials)
            .build();
        let from = from
            .parse()
            .with_context(|| format!("invalid from address: {from}"))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to
                .parse()
                .with_context(|| format!("invalid recipient address: {to}"))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("failed to build email")?;

        self.transport
            .send(message)
            .await
            .context("failed to deliver email")?;
        Ok(())
    }
}
