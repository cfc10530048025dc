//! Login, registration and current-user endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ResultExt};
use super::response::ResponseModel;
use crate::auth::{Auth, CredentialVerifier};
use crate::db::Database;
use crate::jwt::TokenCodec;
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};
use crate::registration::{RegistrationRequest, RegistrationService};

const MAX_USERNAME_LEN: usize = 32;
const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 1024;

#[derive(Clone)]
pub struct AuthApiState {
    pub db: Database,
    pub credentials: CredentialVerifier,
    pub tokens: Arc<TokenCodec>,
    pub session_ttl: Duration,
    pub registration: RegistrationService,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

pub fn router(state: AuthApiState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_register,
        ));

    Router::new()
        .route("/info", get(info))
        .with_state(state)
        .merge(login_router)
        .merge(register_router)
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    id: String,
    token: String,
    issued_at: u64,
    expires_at: u64,
}

async fn login(
    State(state): State<AuthApiState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = match state
        .credentials
        .authenticate(payload.username.trim(), &payload.password)
        .await
    {
        Ok(identity) => identity,
        Err(e) if e.is_rejection() => {
            return Err(ApiError::unauthorized("Authentication failed"));
        }
        Err(e) => return Err(ApiError::internal_error("Failed to check credentials", e)),
    };

    let issued = state
        .tokens
        .issue(
            identity.user_id,
            identity.role,
            &identity.username,
            state.session_ttl,
        )
        .internal_err("Failed to issue session token")?;

    Ok(Json(LoginResponse {
        id: identity.user_id.to_string(),
        token: issued.token,
        issued_at: issued.issued_at,
        expires_at: issued.expires_at,
    }))
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::bad_request("Username cannot be empty"));
    }

    if username.len() > MAX_USERNAME_LEN {
        return Err(ApiError::bad_request(
            "Username cannot be longer than 32 characters",
        ));
    }

    // Only allow alphanumeric and underscores
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ApiError::bad_request(
            "Username can only contain letters, numbers, and underscores",
        ));
    }

    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
        {
            Ok(())
        }
        _ => Err(ApiError::bad_request("Invalid email address")),
    }
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password is too long"));
    }
    Ok(())
}

async fn register(
    State(state): State<AuthApiState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim();
    let email = payload.email.trim();

    validate_username(username)?;
    validate_email(email)?;
    validate_password(&payload.password)?;

    let outcome = state
        .registration
        .register(RegistrationRequest {
            username,
            email,
            password: &payload.password,
        })
        .await
        .internal_err("Failed to register account")?;

    let body = if outcome.is_success() {
        ResponseModel::success(outcome.message())
    } else {
        ResponseModel::fail(outcome.message(), None)
    };
    Ok(Json(body))
}

async fn info(
    State(state): State<AuthApiState>,
    Auth(principal): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .db
        .users()
        .get_summary(principal.user_id)
        .await
        .db_err("Failed to load account")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(summary))
}
