//! The two public authentication steps.

use super::{bearer_token, error_response, AppState, ErrorBody};
use crate::auth::AuthError;
use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub enum TokenType {
    Bearer,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AuthRequest {
    #[serde(rename = "emailAddress")]
    pub email_address: String,
    pub password: String,
}

/// Step-one response: the `VERIFY_OTP` token that resumes the flow once the
/// emailed code arrives. The code itself is never part of any response.
#[derive(Debug, Serialize, ToSchema)]
pub struct OtpVerifyToken {
    pub otp_verify_token: String,
    pub otp_verify_token_expiry: i64,
    pub token_type: TokenType,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub access_token_expiry: i64,
    pub user_name: String,
    pub token_type: TokenType,
}

#[utoipa::path(
    post,
    path = "/Public/Login/firstStepOfAuthentication",
    request_body = AuthRequest,
    responses(
        (status = 200, description = "Password accepted, OTP emailed", body = OtpVerifyToken),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 423, description = "Account temporarily locked", body = ErrorBody),
    ),
    tag = "auth",
)]
#[instrument(skip(state, request))]
pub async fn first_step(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<AuthRequest>,
) -> Result<Json<OtpVerifyToken>, (StatusCode, Json<ErrorBody>)> {
    let challenge = state
        .flow
        .first_step(&request.email_address, &request.password)
        .await
        .map_err(|err| error_response(&err))?;

    Ok(Json(OtpVerifyToken {
        otp_verify_token: challenge.otp_token,
        otp_verify_token_expiry: challenge.expires_in,
        token_type: TokenType::Bearer,
    }))
}

#[utoipa::path(
    get,
    path = "/Authentication/Login/secondStepOfAuthentication/{otpCode}",
    params(
        ("otpCode" = String, Path, description = "The code delivered by email"),
    ),
    responses(
        (status = 200, description = "OTP accepted, session issued", body = AuthResponse),
        (status = 401, description = "Bad or expired OTP or token", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth",
)]
#[instrument(skip(state, headers, otp_code))]
pub async fn second_step(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(otp_code): Path<String>,
) -> Result<Json<AuthResponse>, (StatusCode, Json<ErrorBody>)> {
    let Some(otp_token) = bearer_token(&headers) else {
        return Err(error_response(&AuthError::TokenInvalid));
    };

    let grant = state
        .flow
        .second_step(otp_token, &otp_code)
        .await
        .map_err(|err| error_response(&err))?;

    Ok(Json(AuthResponse {
        access_token: grant.access_token,
        access_token_expiry: grant.expires_in,
        user_name: grant.username,
        token_type: TokenType::Bearer,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::test_state::test_state;
    use crate::auth::test_support::test_account;
    use axum::http::HeaderValue;

    fn auth_header(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header value"),
        );
        headers
    }

    #[tokio::test]
    async fn both_steps_round_trip_over_the_handlers() -> anyhow::Result<()> {
        let harness = test_state();
        harness
            .credentials
            .add(test_account("alice", "a@x.com", "correct"));

        let Json(challenge) = first_step(
            Extension(harness.state.clone()),
            Json(AuthRequest {
                email_address: "a@x.com".to_string(),
                password: "correct".to_string(),
            }),
        )
        .await
        .map_err(|(status, _)| anyhow::anyhow!("first step failed: {status}"))?;

        assert_eq!(challenge.otp_verify_token_expiry, 1200);

        let code = harness
            .mailer
            .last_code()
            .ok_or_else(|| anyhow::anyhow!("no code emailed"))?;

        let Json(response) = second_step(
            Extension(harness.state.clone()),
            auth_header(&challenge.otp_verify_token),
            Path(code),
        )
        .await
        .map_err(|(status, _)| anyhow::anyhow!("second step failed: {status}"))?;

        assert_eq!(response.user_name, "alice");
        assert_eq!(response.access_token_expiry, 86_400);
        Ok(())
    }

    #[tokio::test]
    async fn first_step_maps_unknown_users_to_404() {
        let harness = test_state();
        let result = first_step(
            Extension(harness.state),
            Json(AuthRequest {
                email_address: "ghost@x.com".to_string(),
                password: "whatever".to_string(),
            }),
        )
        .await;

        assert!(matches!(result, Err((StatusCode::NOT_FOUND, _))));
    }

    #[tokio::test]
    async fn first_step_maps_lockout_to_423() {
        let harness = test_state();
        harness
            .credentials
            .add(test_account("alice", "a@x.com", "correct"));

        let mut last_status = None;
        for _ in 0..5 {
            let result = first_step(
                Extension(harness.state.clone()),
                Json(AuthRequest {
                    email_address: "a@x.com".to_string(),
                    password: "wrong".to_string(),
                }),
            )
            .await;
            last_status = result.err().map(|(status, _)| status);
        }
        assert_eq!(last_status, Some(StatusCode::LOCKED));
    }

    #[tokio::test]
    async fn second_step_without_bearer_is_401() {
        let harness = test_state();
        let result = second_step(
            Extension(harness.state),
            HeaderMap::new(),
            Path("123456".to_string()),
        )
        .await;
        assert!(matches!(result, Err((StatusCode::UNAUTHORIZED, _))));
    }

    #[tokio::test]
    async fn second_step_rejects_access_scoped_tokens() -> anyhow::Result<()> {
        let harness = test_state();
        harness
            .credentials
            .add(test_account("alice", "a@x.com", "correct"));

        let access_token = harness.issuer.issue_access_token(
            "alice",
            vec!["ROLE_RESIDENT".to_string()],
            chrono::Utc::now().timestamp(),
        )?;

        let result = second_step(
            Extension(harness.state),
            auth_header(&access_token),
            Path("123456".to_string()),
        )
        .await;
        assert!(matches!(result, Err((StatusCode::UNAUTHORIZED, _))));
        Ok(())
    }
}
