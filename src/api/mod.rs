mod admin;
mod auth;
mod error;
mod response;
mod verify;

use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::CredentialVerifier;
use crate::db::Database;
use crate::jwt::TokenCodec;
use crate::rate_limit::RateLimitConfig;
use crate::registration::RegistrationService;

pub use error::{ApiError, ResultExt};
pub use response::ResponseModel;

/// Create the API router. Mounted under `/api`.
pub fn create_api_router(
    db: Database,
    tokens: Arc<TokenCodec>,
    session_ttl: Duration,
    registration: RegistrationService,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthApiState {
        db: db.clone(),
        credentials: CredentialVerifier::new(db.clone()),
        tokens,
        session_ttl,
        registration: registration.clone(),
        rate_limit_config,
    };

    let verify_state = verify::VerifyState { registration };

    let admin_state = admin::AdminState { db };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/admin", admin::router(admin_state))
        .merge(verify::router(verify_state))
}
