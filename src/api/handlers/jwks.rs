use super::AppState;
use axum::extract::Extension;
use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::response::IntoResponse;
use std::sync::Arc;
use tracing::error;

#[utoipa::path(
    get,
    path = "/.well-known/jwks.json",
    responses(
        (status = 200, description = "JWKS public keys", body = String, content_type = "application/json"),
    ),
    tag = "jwks"
)]
pub async fn jwks(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    match state.jwks.to_json_pretty() {
        Ok(jwks_json) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "application/json")],
            jwks_json,
        ),
        Err(e) => {
            error!("Failed to render JWKS: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE, "application/json")],
                "{}".to_string(),
            )
        }
    }
}
