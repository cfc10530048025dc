pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod email_token;
pub mod jwt;
pub mod mail;
pub mod password;
pub mod rate_limit;
pub mod registration;

use api::create_api_router;
use auth::{AccessPolicy, AuthGate, require_auth};
use axum::{Router, middleware};
use db::Database;
use email_token::EmailTokenCodec;
use jwt::TokenCodec;
use mail::Mailer;
use rate_limit::{RateLimitConfig, RateLimits};
use registration::RegistrationService;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

/// Everything the server needs, fixed at startup.
pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing session tokens
    pub jwt_secret: Vec<u8>,
    /// Secret for signing email verification tokens. Must differ from `jwt_secret`.
    pub email_secret: Vec<u8>,
    /// Issuer stamped into session tokens
    pub issuer: String,
    pub session_ttl: Duration,
    pub email_token_ttl: Duration,
    /// Base URL for links sent by mail
    pub public_url: Url,
    pub rate_limits: RateLimits,
    pub mailer: Arc<dyn Mailer>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let tokens = Arc::new(TokenCodec::new(&config.jwt_secret, config.issuer.clone()));
    let email_tokens = Arc::new(EmailTokenCodec::new(
        &config.email_secret,
        config.email_token_ttl,
    ));

    let registration = RegistrationService::new(
        config.db.clone(),
        email_tokens,
        config.mailer.clone(),
        config.public_url.clone(),
    );

    let api_router = create_api_router(
        config.db.clone(),
        tokens.clone(),
        config.session_ttl,
        registration,
        Arc::new(RateLimitConfig::new(config.rate_limits)),
    );

    let gate = AuthGate::new(tokens, config.db.clone(), AccessPolicy::default());

    // Wraps every route, so no handler runs before the gate has decided.
    Router::new()
        .nest("/api", api_router)
        .layer(middleware::from_fn_with_state(gate, require_auth))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
