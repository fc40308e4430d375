use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{smtp, tokens};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Translate parsed CLI matches into the action to execute.
///
/// # Errors
///
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let frontend_url = matches
        .get_one::<String>("frontend-url")
        .cloned()
        .context("missing required argument: --frontend-url")?;

    let issuer = matches
        .get_one::<String>(tokens::ARG_ISSUER)
        .cloned()
        .context("missing required argument: --issuer")?;
    let signing_key = matches.get_one::<String>(tokens::ARG_SIGNING_KEY).cloned();
    let bootstrap_email = matches
        .get_one::<String>(tokens::ARG_BOOTSTRAP_EMAIL)
        .cloned();
    let bootstrap_password = matches
        .get_one::<String>(tokens::ARG_BOOTSTRAP_PASSWORD)
        .map(|password| SecretString::from(password.clone()));

    let smtp_host = matches.get_one::<String>(smtp::ARG_SMTP_HOST).cloned();
    let smtp_username = matches.get_one::<String>(smtp::ARG_SMTP_USERNAME).cloned();
    let smtp_password = matches
        .get_one::<String>(smtp::ARG_SMTP_PASSWORD)
        .map(|password| SecretString::from(password.clone()));
    let smtp_from = matches
        .get_one::<String>(smtp::ARG_SMTP_FROM)
        .cloned()
        .context("missing required argument: --smtp-from")?;

    Ok(Action::Server(Args {
        port,
        dsn,
        frontend_url,
        issuer,
        signing_key,
        bootstrap_email,
        bootstrap_password,
        smtp_host,
        smtp_username,
        smtp_password,
        smtp_from,
    }))
}
