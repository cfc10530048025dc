//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::AuthFailure;
use super::principal::RequestPrincipal;

/// The principal the gate attached to this request.
///
/// Rejects with 401 if the request reached the handler without one, which
/// only happens on public routes.
pub struct Auth(pub RequestPrincipal);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthFailure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestPrincipal>()
            .cloned()
            .map(Auth)
            .ok_or_else(AuthFailure::unauthorized)
    }
}
