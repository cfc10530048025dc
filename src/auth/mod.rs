//! Stateless bearer-token authentication with role-based access control.
//!
//! Login checks a username/password pair and issues a signed session token.
//! Every later request presents that token; the gate verifies it, confirms
//! the account is still enabled, and applies the access policy before any
//! handler runs.

mod access;
mod credentials;
mod errors;
mod extractors;
mod gate;
mod principal;

pub use access::{AccessPolicy, Decision, Denial};
pub use credentials::{CredentialVerifier, VerifiedIdentity};
pub use errors::{
    AuthFailure, AuthorizationError, CredentialError, Rejection, ResolveError, TokenError,
};
pub use extractors::Auth;
pub use gate::{AuthGate, AuthState, PresentedCredential, extract_bearer, require_auth};
pub use principal::RequestPrincipal;
