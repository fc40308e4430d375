//! Account lookup for authenticated callers.

use super::identity::Identity;
use super::{error_response, AppState, ErrorBody};
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoDto {
    pub user_id: Uuid,
    pub user_name: String,
    pub email_address: String,
    pub authorities: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/UserDetails/getUserInfoById/{userName}",
    params(
        ("userName" = String, Path, description = "Username to look up"),
    ),
    responses(
        (status = 200, description = "Account details", body = UserInfoDto),
        (status = 401, description = "Authentication required", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users",
)]
#[instrument(skip(state, identity))]
pub async fn get_user_info_by_id(
    Extension(state): Extension<Arc<AppState>>,
    identity: Option<Extension<Identity>>,
    Path(user_name): Path<String>,
) -> Result<Json<UserInfoDto>, (StatusCode, Json<ErrorBody>)> {
    // The filter lets anonymous requests through; authentication is enforced
    // per endpoint.
    if identity.is_none() {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody {
                error: "Authentication required".to_string(),
            }),
        ));
    }

    let account = state
        .flow
        .resolve_subject(&user_name)
        .await
        .map_err(|err| error_response(&err))?;

    Ok(Json(UserInfoDto {
        user_id: account.account_id,
        user_name: account.username,
        email_address: account.email_address,
        authorities: account.authorities,
    }))
}
