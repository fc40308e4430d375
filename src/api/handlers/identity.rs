//! Bearer-token filter applied to every request.
//!
//! A request without an `Authorization` header proceeds anonymously; the
//! handler decides whether that is acceptable. A present-but-bad token is
//! rejected here with 401.

use super::{bearer_token, error_response, AppState};
use crate::auth::AuthError;
use axum::extract::{Extension, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Authenticated caller, inserted as a request extension for downstream
/// handlers.
#[derive(Debug, Clone)]
pub struct Identity {
    pub account_id: Uuid,
    pub username: String,
    pub authorities: Vec<String>,
}

pub async fn identity_layer(
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_string) else {
        // Anonymous request; downstream authorization decides.
        return next.run(request).await;
    };

    let token_identity = match state.validator.validate(&token, Utc::now().timestamp()) {
        Ok(identity) => identity,
        Err(err) => {
            debug!("token rejected: {err}");
            return error_response(&AuthError::from(err)).into_response();
        }
    };

    // Authorities come from the live account record, not from the token's
    // scope claim.
    match state.flow.resolve_subject(&token_identity.subject).await {
        Ok(account) => {
            request.extensions_mut().insert(Identity {
                account_id: account.account_id,
                username: account.username,
                authorities: account.authorities,
            });
            next.run(request).await
        }
        Err(AuthError::UserNotFound) => {
            debug!(subject = %token_identity.subject, "token subject no longer resolves");
            error_response(&AuthError::TokenInvalid).into_response()
        }
        Err(err) => error_response(&err).into_response(),
    }
}
