//! Signing-key, issuer, and bootstrap arguments.

use clap::{Arg, Command};

pub const ARG_SIGNING_KEY: &str = "signing-key";
pub const ARG_ISSUER: &str = "issuer";
pub const ARG_BOOTSTRAP_EMAIL: &str = "bootstrap-email";
pub const ARG_BOOTSTRAP_PASSWORD: &str = "bootstrap-password";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SIGNING_KEY)
                .long(ARG_SIGNING_KEY)
                .help("Path to the RSA private key (PKCS#8/PKCS#1, PEM or DER)")
                .long_help(
                    "Path to the RSA private key used to sign session tokens. \
                     Without it an ephemeral keypair is generated at startup and \
                     previously issued tokens stop verifying after a restart.",
                )
                .env("PORTINERIA_SIGNING_KEY"),
        )
        .arg(
            Arg::new(ARG_ISSUER)
                .long(ARG_ISSUER)
                .help("Issuer claim stamped into every signed token")
                .default_value("portineria")
                .env("PORTINERIA_ISSUER"),
        )
        .arg(
            Arg::new(ARG_BOOTSTRAP_EMAIL)
                .long(ARG_BOOTSTRAP_EMAIL)
                .help("Seed an admin account with this email at startup")
                .env("PORTINERIA_BOOTSTRAP_EMAIL")
                .requires(ARG_BOOTSTRAP_PASSWORD),
        )
        .arg(
            Arg::new(ARG_BOOTSTRAP_PASSWORD)
                .long(ARG_BOOTSTRAP_PASSWORD)
                .help("Password for the seeded admin account")
                .env("PORTINERIA_BOOTSTRAP_PASSWORD")
                .requires(ARG_BOOTSTRAP_EMAIL),
        )
}
