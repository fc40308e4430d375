//! HTTP server assembly: pool, migrations, flow wiring, layers, and serve
//! loop.

use crate::auth::postgres::{bootstrap_account, PgCredentialStore, PgOtpStore};
use crate::auth::{
    Argon2PasswordHasher, AuthenticationFlow, CredentialStore, LockoutPolicy, OtpLifecycle,
    OtpStore, PasswordHasher,
};
use crate::email::Mailer;
use crate::token::{KeyMaterial, TokenIssuer, TokenValidator};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    Extension,
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;

pub(crate) mod handlers;
mod openapi;

pub use handlers::AppState;
pub use openapi::openapi;

/// Seed credentials for the initial admin account.
pub struct BootstrapAccount {
    pub email: String,
    pub password: SecretString,
}

pub struct ServerConfig {
    pub port: u16,
    pub dsn: String,
    pub frontend_url: String,
    pub issuer: String,
    pub keys: Arc<KeyMaterial>,
    pub mailer: Arc<dyn Mailer>,
    pub bootstrap: Option<BootstrapAccount>,
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(config: ServerConfig) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&config.dsn)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2PasswordHasher);

    if let Some(bootstrap) = &config.bootstrap {
        if !handlers::valid_email(&bootstrap.email) {
            return Err(anyhow!(
                "Invalid bootstrap email address: {}",
                bootstrap.email
            ));
        }
        let username = bootstrap
            .email
            .split('@')
            .next()
            .unwrap_or(bootstrap.email.as_str());
        let password_hash = hasher.hash(bootstrap.password.expose_secret())?;
        if bootstrap_account(&pool, &bootstrap.email, username, &password_hash).await? {
            info!(email = %bootstrap.email, "bootstrap account created");
        } else {
            info!(email = %bootstrap.email, "bootstrap account already present");
        }
    }

    let credentials: Arc<dyn CredentialStore> = Arc::new(PgCredentialStore::new(pool.clone()));
    let otp_store: Arc<dyn OtpStore> = Arc::new(PgOtpStore::new(pool.clone()));

    let flow = AuthenticationFlow::new(
        credentials.clone(),
        hasher,
        LockoutPolicy::new(credentials.clone()),
        OtpLifecycle::new(otp_store, config.mailer.clone()),
        TokenIssuer::new(config.keys.clone(), config.issuer.clone()),
        TokenValidator::new(config.keys.clone(), config.issuer.clone()),
    );

    let state = Arc::new(AppState {
        flow,
        validator: TokenValidator::new(config.keys.clone(), config.issuer.clone()),
        jwks: config.keys.jwks().context("Failed to build JWKS")?,
    });

    let frontend_origin = frontend_origin(&config.frontend_url)?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let (router, _openapi) = openapi::api_router().split_for_parts();
    let app = router
        .layer(axum::middleware::from_fn(
            handlers::identity::identity_layer,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state.clone()))
                .layer(Extension(pool.clone())),
        );

    let listener = TcpListener::bind(format!("::0:{}", config.port)).await?;

    info!("Listening on [::]:{}", config.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
