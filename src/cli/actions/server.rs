use crate::api;
use crate::email::{LogMailer, Mailer, SmtpMailer};
use crate::token::{KeyMaterial, DEFAULT_KEY_ID};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{fs, sync::Arc};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_url: String,
    pub issuer: String,
    pub signing_key: Option<String>,
    pub bootstrap_email: Option<String>,
    pub bootstrap_password: Option<SecretString>,
    pub smtp_host: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub smtp_from: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if key material or the mailer cannot be built, or the
/// server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let keys = match &args.signing_key {
        Some(path) => {
            let pem_or_der =
                fs::read(path).with_context(|| format!("failed to read signing key: {path}"))?;
            Arc::new(
                KeyMaterial::from_private_key_pem_or_der(&pem_or_der, DEFAULT_KEY_ID)
                    .with_context(|| format!("invalid signing key: {path}"))?,
            )
        }
        None => {
            warn!("no signing key configured; generating an ephemeral RSA keypair");
            Arc::new(
                KeyMaterial::generate(2048, DEFAULT_KEY_ID)
                    .context("failed to generate RSA keypair")?,
            )
        }
    };

    let mailer: Arc<dyn Mailer> = match (&args.smtp_host, &args.smtp_username, &args.smtp_password)
    {
        (Some(host), Some(username), Some(password)) => Arc::new(
            SmtpMailer::new(host, username, password, &args.smtp_from)
                .context("failed to build SMTP mailer")?,
        ),
        _ => {
            info!("smtp relay not configured; outbound mail goes to the log");
            Arc::new(LogMailer)
        }
    };

    let bootstrap = match (args.bootstrap_email, args.bootstrap_password) {
        (Some(email), Some(password)) => Some(api::BootstrapAccount { email, password }),
        _ => None,
    };

    api::new(api::ServerConfig {
        port: args.port,
        dsn: args.dsn,
        frontend_url: args.frontend_url,
        issuer: args.issuer,
        keys,
        mailer,
        bootstrap,
    })
    .await
}
