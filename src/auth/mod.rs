//! Authentication core: password verification with brute-force lockout, the
//! emailed one-time-password second factor, and the three-step flow that ties
//! them to token issuance.
//!
//! All shared mutable state lives behind the [`store::CredentialStore`] and
//! [`store::OtpStore`] seams; the types here never hold long-lived references
//! to persisted rows.

pub mod error;
pub mod flow;
pub mod lockout;
pub mod models;
pub mod otp;
pub mod password;
pub mod postgres;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::AuthError;
pub use flow::{AuthenticationFlow, OtpChallenge, SessionGrant};
pub use lockout::LockoutPolicy;
pub use models::{Account, LockoutState, OtpRecord};
pub use otp::OtpLifecycle;
pub use password::{Argon2PasswordHasher, PasswordHasher};
pub use store::{CredentialStore, OtpStore};
