//! Rate limiting for login and registration.
//!
//! Uses a token bucket per client IP to slow down password guessing and
//! registration spam.

use std::{net::SocketAddr, num::NonZeroU32, sync::Arc};

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use serde::Serialize;
use tracing::warn;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const DEFAULT_LOGIN_PER_MINUTE: NonZeroU32 = NonZeroU32::new(10).unwrap();
const DEFAULT_REGISTER_PER_MINUTE: NonZeroU32 = NonZeroU32::new(3).unwrap();

/// Requests per minute allowed per client IP.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub login_per_minute: NonZeroU32,
    pub register_per_minute: NonZeroU32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            login_per_minute: DEFAULT_LOGIN_PER_MINUTE,
            register_per_minute: DEFAULT_REGISTER_PER_MINUTE,
        }
    }
}

#[derive(Clone)]
pub struct RateLimitConfig {
    pub login: Arc<IpLimiter>,
    pub register: Arc<IpLimiter>,
}

impl RateLimitConfig {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(Quota::per_minute(limits.login_per_minute))),
            register: Arc::new(RateLimiter::keyed(Quota::per_minute(
                limits.register_per_minute,
            ))),
        }
    }
}

/// The limiter key for a request: the peer IP, or a shared bucket when the
/// server was not started with connect info.
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn too_many_requests(message: &'static str) -> Response {
    #[derive(Serialize)]
    struct ErrorResponse {
        error: &'static str,
    }

    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorResponse { error: message }),
    )
        .into_response()
}

/// Middleware for rate limiting login.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    match config.login.check_key(&key) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(client = key, "Login rate limit exceeded");
            too_many_requests("Too many login attempts. Please wait before trying again.")
        }
    }
}

/// Middleware for rate limiting registration.
pub async fn rate_limit_register(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    match config.register.check_key(&key) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(client = key, "Registration rate limit exceeded");
            too_many_requests("Too many signup attempts. Please wait before trying again.")
        }
    }
}
