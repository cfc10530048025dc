//! Authentication and authorization error types.
//!
//! Variants are distinguished in logs only. On the wire every credential or
//! token failure is the same 401 and every role failure the same 403.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::access::Denial;
use crate::db::UserRole;

/// Login-time failures.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("unknown user")]
    UnknownUser,
    #[error("account disabled")]
    AccountDisabled,
    #[error("bad credentials")]
    BadCredentials,
    #[error("credential store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("password check did not complete: {0}")]
    Hasher(#[from] tokio::task::JoinError),
}

impl CredentialError {
    /// True for the three outcomes that mean "these credentials are not accepted",
    /// as opposed to the server failing to decide.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnknownUser | Self::AccountDisabled | Self::BadCredentials
        )
    }
}

/// Verification-time failures of a presented session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    SignatureInvalid,
    #[error("expired token")]
    Expired,
}

/// Claims that verified but do not describe a usable principal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("subject is not a UUID: {0}")]
    BadSubject(String),
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    #[error("insufficient role: requires {required:?}, has {actual:?}")]
    InsufficientRole { required: UserRole, actual: UserRole },
}

/// Why the authentication gate rejected a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("missing credential")]
    MissingCredential,
    #[error("{0}")]
    Token(#[from] TokenError),
    #[error("unresolvable claims: {0}")]
    Unresolvable(#[from] ResolveError),
    #[error("account missing or disabled")]
    AccountUnavailable,
}

/// Uniform failure response for the gate and extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthFailure {
    status: StatusCode,
}

impl AuthFailure {
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn message(&self) -> &'static str {
        if self.status == StatusCode::FORBIDDEN {
            "Forbidden"
        } else {
            "Unauthorized"
        }
    }
}

impl From<Denial> for AuthFailure {
    fn from(denial: Denial) -> Self {
        Self {
            status: denial.status(),
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            self.status,
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
