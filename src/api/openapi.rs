use super::handlers::{health, jwks, login, user_details};
use utoipa::openapi::{InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the
    // route to OpenAPI.
    OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(login::first_step))
        .routes(routes!(login::second_step))
        .routes(routes!(jwks::jwks))
        .routes(routes!(user_details::get_user_info_by_id))
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.license = cargo_license();

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Two-step login and token issuance".to_string());

    let mut jwks_tag = Tag::new("jwks");
    jwks_tag.description = Some("Public signing keys".to_string());

    let mut users_tag = Tag::new("users");
    users_tag.description = Some("Account details for authenticated callers".to_string());

    OpenApiBuilder::new()
        .info(info)
        .tags(Some(vec![auth_tag, jwks_tag, users_tag]))
        .build()
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            spec.info.description.as_deref(),
            Some(env!("CARGO_PKG_DESCRIPTION"))
        );
    }

    #[test]
    fn documented_paths_cover_the_public_surface() {
        let spec = openapi();
        let paths: Vec<&str> = spec.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/health",
            "/Public/Login/firstStepOfAuthentication",
            "/Authentication/Login/secondStepOfAuthentication/{otpCode}",
            "/.well-known/jwks.json",
            "/UserDetails/getUserInfoById/{userName}",
        ] {
            assert!(paths.contains(&expected), "missing path: {expected}");
        }
    }

    #[test]
    fn optional_str_filters_empty() {
        assert_eq!(optional_str(""), None);
        assert_eq!(optional_str("  "), None);
        assert_eq!(optional_str("text"), Some("text"));
    }
}
