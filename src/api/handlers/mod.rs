//! Route handlers and the shared state/error plumbing behind them.

pub mod health;
pub mod identity;
pub mod jwks;
pub mod login;
pub mod user_details;

use crate::auth::{AuthError, AuthenticationFlow};
use crate::token::{Jwks, TokenValidator};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::Json;
use regex::Regex;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// Lightweight email sanity check used before persisting account data.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Everything a request handler needs, wired once at startup and shared via
/// an `Extension`.
pub struct AppState {
    pub flow: AuthenticationFlow,
    pub validator: TokenValidator,
    pub jwks: Jwks,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// Map a domain error onto its transport status. Internal failures are logged
/// in full here and leave the process only as a generic retry message.
pub(crate) fn error_response(err: &AuthError) -> (StatusCode, Json<ErrorBody>) {
    let (status, message) = match err {
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
        AuthError::AccountLocked => (StatusCode::LOCKED, "Account temporarily locked"),
        AuthError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
        AuthError::OtpNotFound => (StatusCode::UNAUTHORIZED, "Otp code not found"),
        AuthError::OtpExpired => (StatusCode::UNAUTHORIZED, "Otp code expired"),
        AuthError::TokenInvalid | AuthError::TokenExpired => {
            (StatusCode::UNAUTHORIZED, "Invalid or expired token")
        }
        AuthError::Internal(source) => {
            error!("unexpected failure: {source:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Please try again")
        }
    };

    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}

/// Extract the bearer token from an `Authorization` header, if present.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
pub(crate) mod test_state {
    use super::AppState;
    use crate::auth::test_support::{
        CapturingMailer, MemoryCredentialStore, MemoryOtpStore, PlainPasswordHasher,
    };
    use crate::auth::{AuthenticationFlow, LockoutPolicy, OtpLifecycle};
    use crate::token::test_keys::test_key_material;
    use crate::token::{TokenIssuer, TokenValidator};
    use std::sync::Arc;

    pub(crate) const TEST_ISSUER: &str = "portineria-test";

    pub(crate) struct TestState {
        pub(crate) state: Arc<AppState>,
        pub(crate) credentials: Arc<MemoryCredentialStore>,
        pub(crate) mailer: Arc<CapturingMailer>,
        pub(crate) issuer: TokenIssuer,
    }

    pub(crate) fn test_state() -> TestState {
        let credentials = Arc::new(MemoryCredentialStore::default());
        let otp_store = Arc::new(MemoryOtpStore::default());
        let mailer = Arc::new(CapturingMailer::default());
        let keys = Arc::new(test_key_material());

        let flow = AuthenticationFlow::new(
            credentials.clone(),
            Arc::new(PlainPasswordHasher),
            LockoutPolicy::new(credentials.clone()),
            OtpLifecycle::new(otp_store, mailer.clone()),
            TokenIssuer::new(keys.clone(), TEST_ISSUER),
            TokenValidator::new(keys.clone(), TEST_ISSUER),
        );

        let state = Arc::new(AppState {
            flow,
            validator: TokenValidator::new(keys.clone(), TEST_ISSUER),
            jwks: keys.jwks().expect("test jwks"),
        });

        TestState {
            state,
            credentials,
            mailer,
            issuer: TokenIssuer::new(keys, TEST_ISSUER),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn error_statuses_match_the_taxonomy() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::AccountLocked, StatusCode::LOCKED),
            (AuthError::UserNotFound, StatusCode::NOT_FOUND),
            (AuthError::OtpNotFound, StatusCode::UNAUTHORIZED),
            (AuthError::OtpExpired, StatusCode::UNAUTHORIZED),
            (AuthError::TokenInvalid, StatusCode::UNAUTHORIZED),
            (AuthError::TokenExpired, StatusCode::UNAUTHORIZED),
            (
                AuthError::Internal(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let (status, _) = error_response(&err);
            assert_eq!(status, expected, "wrong status for {err:?}");
        }
    }

    #[test]
    fn internal_errors_never_leak_details() {
        let (_, Json(body)) = error_response(&AuthError::Internal(anyhow::anyhow!(
            "connection refused: 10.0.0.5:5432"
        )));
        assert_eq!(body.error, "Please try again");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email("spaced out@example.com"));
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }
}
