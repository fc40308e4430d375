//! # Portineria (tenant authentication authority)
//!
//! `portineria` is the authentication and token-issuance service of a
//! tenant-communication platform. It owns the three-step login pipeline:
//!
//! - **Step one** verifies the password against the stored Argon2 hash and
//!   counts failures toward a temporary lockout (5 failures, 5 minutes).
//! - **Step two** redeems a one-time code delivered by email. Codes are
//!   single-use, expire after 5 minutes, and at most one code per account is
//!   valid at any instant.
//! - **Step three** mints an RS256-signed session token whose scope lists the
//!   account's authority names, read from live account state.
//!
//! The `VERIFY_OTP`-scoped token returned by step one is the only carrier of
//! in-flight flow state, so any instance can serve any step. The RSA public
//! key is published at `/.well-known/jwks.json` for cross-service
//! verification.
//!
//! Chat, building management, and the rest of the platform consume the issued
//! tokens; they are separate services and never reach into this crate's
//! storage.

pub mod api;
pub mod auth;
pub mod cli;
pub mod email;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
