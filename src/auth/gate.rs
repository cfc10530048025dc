//! The per-request authentication gate.
//!
//! Every request passes through [`require_auth`] before routing. A bearer
//! token, if present, is verified and resolved to a [`RequestPrincipal`];
//! the [`AccessPolicy`] then decides whether the request may continue.

use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Request, State},
    http::{HeaderMap, Method, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use super::access::{AccessPolicy, Decision, Denial};
use super::errors::{AuthFailure, Rejection, TokenError};
use super::principal::RequestPrincipal;
use crate::api::ApiError;
use crate::db::Database;
use crate::jwt::{SessionClaims, TokenCodec, VerificationOutcome};

const BEARER_PREFIX: &str = "Bearer ";

/// Where a request stands after the gate has looked at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No credential was presented on a public route.
    Unauthenticated,
    Verified(RequestPrincipal),
    Rejected(Rejection),
}

/// What the `Authorization` header carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentedCredential<'a> {
    Absent,
    Bearer(&'a str),
    /// A header was present but was not a usable bearer token.
    Unreadable,
}

/// Pull the bearer token out of the request headers.
pub fn extract_bearer(headers: &HeaderMap) -> PresentedCredential<'_> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return PresentedCredential::Absent;
    };

    match value.to_str() {
        Ok(value) => match value.strip_prefix(BEARER_PREFIX) {
            Some(token) if !token.trim().is_empty() => PresentedCredential::Bearer(token.trim()),
            _ => PresentedCredential::Unreadable,
        },
        Err(_) => PresentedCredential::Unreadable,
    }
}

fn classify(outcome: VerificationOutcome) -> Result<SessionClaims, TokenError> {
    match outcome {
        VerificationOutcome::Valid(claims) => Ok(claims),
        VerificationOutcome::Expired => Err(TokenError::Expired),
        VerificationOutcome::Malformed => Err(TokenError::Malformed),
        VerificationOutcome::SignatureInvalid => Err(TokenError::SignatureInvalid),
    }
}

/// Shared state for the gate middleware.
#[derive(Clone)]
pub struct AuthGate {
    tokens: Arc<TokenCodec>,
    db: Database,
    policy: Arc<AccessPolicy>,
}

impl AuthGate {
    pub fn new(tokens: Arc<TokenCodec>, db: Database, policy: AccessPolicy) -> Self {
        Self {
            tokens,
            db,
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Work out the [`AuthState`] of a request.
    ///
    /// The token is checked, the claims are resolved, and the account is
    /// looked up so that a disabled or deleted account stops working before
    /// its tokens expire. Only a store failure is an `Err`.
    pub async fn authenticate(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<AuthState, sqlx::Error> {
        let token = match extract_bearer(headers) {
            PresentedCredential::Bearer(token) => token,
            PresentedCredential::Unreadable => {
                return Ok(AuthState::Rejected(TokenError::Malformed.into()));
            }
            PresentedCredential::Absent if self.policy.is_public(method, path) => {
                return Ok(AuthState::Unauthenticated);
            }
            PresentedCredential::Absent => {
                return Ok(AuthState::Rejected(Rejection::MissingCredential));
            }
        };

        let claims = match classify(self.tokens.verify(token)) {
            Ok(claims) => claims,
            Err(e) => return Ok(AuthState::Rejected(Rejection::Token(e))),
        };

        let principal = match RequestPrincipal::resolve(&claims) {
            Ok(principal) => principal,
            Err(e) => return Ok(AuthState::Rejected(e.into())),
        };

        match self.db.users().get_by_id(principal.user_id).await? {
            Some(user) if user.enabled => Ok(AuthState::Verified(principal)),
            _ => Ok(AuthState::Rejected(Rejection::AccountUnavailable)),
        }
    }
}

/// Middleware that authenticates every request and enforces the access policy.
///
/// On success the [`RequestPrincipal`], if any, is stored in the request
/// extensions for handlers to pick up through [`super::Auth`].
pub async fn require_auth(State(gate): State<AuthGate>, mut request: Request, next: Next) -> Response {
    let method = request.method().clone();
    // Nested routers see a stripped URI; policy rules are written against the full path.
    let path = match request.extensions().get::<OriginalUri>() {
        Some(OriginalUri(uri)) => uri.path().to_string(),
        None => request.uri().path().to_string(),
    };

    let state = match gate.authenticate(&method, &path, request.headers()).await {
        Ok(state) => state,
        Err(e) => return ApiError::db_error("Failed to look up account", e).into_response(),
    };

    match gate.policy().decide(&method, &path, &state) {
        Decision::Allow => {
            if let AuthState::Rejected(reason) = &state {
                debug!(%method, %path, %reason, "Ignoring bad credential on public route");
            }
            if let AuthState::Verified(principal) = state {
                request.extensions_mut().insert(principal);
            }
            next.run(request).await
        }
        Decision::Deny(denial) => {
            match (&denial, &state) {
                (Denial::Forbidden(e), _) => warn!(%method, %path, error = %e, "Request forbidden"),
                (_, AuthState::Rejected(reason)) => {
                    warn!(%method, %path, %reason, "Request rejected")
                }
                _ => warn!(%method, %path, "Request rejected: not authenticated"),
            }
            AuthFailure::from(denial).into_response()
        }
    }
}
