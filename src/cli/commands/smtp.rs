//! SMTP relay arguments. Without a host, outbound mail goes to the log.

use clap::{Arg, Command};

pub const ARG_SMTP_HOST: &str = "smtp-host";
pub const ARG_SMTP_USERNAME: &str = "smtp-username";
pub const ARG_SMTP_PASSWORD: &str = "smtp-password";
pub const ARG_SMTP_FROM: &str = "smtp-from";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long(ARG_SMTP_HOST)
                .help("SMTP relay host (log-only delivery when unset)")
                .env("PORTINERIA_SMTP_HOST")
                .requires(ARG_SMTP_USERNAME)
                .requires(ARG_SMTP_PASSWORD),
        )
        .arg(
            Arg::new(ARG_SMTP_USERNAME)
                .long(ARG_SMTP_USERNAME)
                .help("SMTP relay username")
                .env("PORTINERIA_SMTP_USERNAME"),
        )
        .arg(
            Arg::new(ARG_SMTP_PASSWORD)
                .long(ARG_SMTP_PASSWORD)
                .help("SMTP relay password")
                .env("PORTINERIA_SMTP_PASSWORD"),
        )
        .arg(
            Arg::new(ARG_SMTP_FROM)
                .long(ARG_SMTP_FROM)
                .help("From mailbox for outbound mail")
                .default_value("Portineria <no-reply@portineria.dev>")
                .env("PORTINERIA_SMTP_FROM"),
        )
}
