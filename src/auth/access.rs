//! Route-level access decisions.

use axum::http::{Method, StatusCode};

use super::errors::AuthorizationError;
use super::gate::AuthState;
use crate::db::UserRole;

/// Outcome of an access decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// No acceptable identity was presented.
    Unauthenticated,
    /// The identity is fine but lacks a role the route needs.
    Forbidden(AuthorizationError),
}

impl Denial {
    pub fn status(&self) -> StatusCode {
        match self {
            Denial::Unauthenticated => StatusCode::UNAUTHORIZED,
            Denial::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

/// Which routes are public and which need a role beyond "authenticated".
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    public_routes: Vec<(Method, String)>,
    role_prefixes: Vec<(String, UserRole)>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new()
            .allow_public(Method::POST, "/api/auth/login")
            .allow_public(Method::POST, "/api/auth/register")
            .allow_public(Method::GET, "/api/verify")
            .require_role("/api/admin", UserRole::Admin)
    }
}

impl AccessPolicy {
    /// A policy with no public routes and no role rules.
    pub fn new() -> Self {
        Self {
            public_routes: Vec::new(),
            role_prefixes: Vec::new(),
        }
    }

    pub fn allow_public(mut self, method: Method, path: impl Into<String>) -> Self {
        self.public_routes.push((method, path.into()));
        self
    }

    /// Require `role` for `prefix` and every path beneath it.
    pub fn require_role(mut self, prefix: impl Into<String>, role: UserRole) -> Self {
        self.role_prefixes.push((prefix.into(), role));
        self
    }

    /// Preflight requests are always public. A public `GET` also admits `HEAD`,
    /// matching how the router serves them.
    pub fn is_public(&self, method: &Method, path: &str) -> bool {
        *method == Method::OPTIONS
            || self.public_routes.iter().any(|(m, p)| {
                p == path && (m == method || (*m == Method::GET && *method == Method::HEAD))
            })
    }

    pub fn required_role(&self, path: &str) -> Option<UserRole> {
        self.role_prefixes
            .iter()
            .find(|(prefix, _)| under_prefix(path, prefix))
            .map(|(_, role)| *role)
    }

    /// Decide whether a request may reach its handler.
    ///
    /// Rules apply in order: public routes are allowed whatever the auth
    /// state, anything short of a verified principal is a 401, and a
    /// principal missing the route's role is a 403.
    pub fn decide(&self, method: &Method, path: &str, state: &AuthState) -> Decision {
        if self.is_public(method, path) {
            return Decision::Allow;
        }

        let principal = match state {
            AuthState::Verified(principal) => principal,
            AuthState::Unauthenticated | AuthState::Rejected(_) => {
                return Decision::Deny(Denial::Unauthenticated);
            }
        };

        if let Some(required) = self.required_role(path) {
            if !principal.has_role(required) {
                return Decision::Deny(Denial::Forbidden(AuthorizationError::InsufficientRole {
                    required,
                    actual: principal.role,
                }));
            }
        }

        Decision::Allow
    }
}

fn under_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::errors::{Rejection, TokenError};
    use crate::auth::principal::RequestPrincipal;
    use uuid::Uuid;

    fn verified(role: UserRole) -> AuthState {
        AuthState::Verified(RequestPrincipal {
            user_id: Uuid::new_v4(),
            display_name: "alice".into(),
            role,
        })
    }

    #[test]
    fn test_public_routes_allow_any_state() {
        let policy = AccessPolicy::default();
        let expired = AuthState::Rejected(Rejection::Token(TokenError::Expired));

        for state in [AuthState::Unauthenticated, expired, verified(UserRole::User)] {
            assert_eq!(
                policy.decide(&Method::POST, "/api/auth/login", &state),
                Decision::Allow
            );
        }
    }

    #[test]
    fn test_public_route_matches_method() {
        let policy = AccessPolicy::default();

        assert!(policy.is_public(&Method::POST, "/api/auth/register"));
        assert!(!policy.is_public(&Method::GET, "/api/auth/register"));
        assert!(policy.is_public(&Method::GET, "/api/verify"));
        assert!(policy.is_public(&Method::HEAD, "/api/verify"));
        assert!(!policy.is_public(&Method::HEAD, "/api/auth/login"));
    }

    #[test]
    fn test_options_always_public() {
        let policy = AccessPolicy::default();
        assert_eq!(
            policy.decide(&Method::OPTIONS, "/api/admin/users", &AuthState::Unauthenticated),
            Decision::Allow
        );
    }

    #[test]
    fn test_protected_route_requires_principal() {
        let policy = AccessPolicy::default();

        for state in [
            AuthState::Unauthenticated,
            AuthState::Rejected(Rejection::MissingCredential),
            AuthState::Rejected(Rejection::AccountUnavailable),
        ] {
            let decision = policy.decide(&Method::GET, "/api/auth/info", &state);
            assert_eq!(decision, Decision::Deny(Denial::Unauthenticated));
        }

        assert_eq!(
            policy.decide(&Method::GET, "/api/auth/info", &verified(UserRole::User)),
            Decision::Allow
        );
    }

    #[test]
    fn test_role_rule() {
        let policy = AccessPolicy::default();

        match policy.decide(&Method::GET, "/api/admin/users", &verified(UserRole::User)) {
            Decision::Deny(denial) => assert_eq!(denial.status(), StatusCode::FORBIDDEN),
            Decision::Allow => panic!("user reached an admin route"),
        }

        assert_eq!(
            policy.decide(&Method::GET, "/api/admin/users", &verified(UserRole::Admin)),
            Decision::Allow
        );
    }

    #[test]
    fn test_role_prefix_boundary() {
        let policy = AccessPolicy::default();

        assert_eq!(policy.required_role("/api/admin"), Some(UserRole::Admin));
        assert_eq!(policy.required_role("/api/admin/users/1"), Some(UserRole::Admin));
        assert_eq!(policy.required_role("/api/administrivia"), None);
        assert_eq!(policy.required_role("/api/auth/info"), None);
    }

    #[test]
    fn test_unauthenticated_beats_role_rule() {
        let policy = AccessPolicy::default();
        let decision = policy.decide(
            &Method::GET,
            "/api/admin/users",
            &AuthState::Rejected(Rejection::Token(TokenError::SignatureInvalid)),
        );

        assert_eq!(decision, Decision::Deny(Denial::Unauthenticated));
    }
}
