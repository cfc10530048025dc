//! The authenticated identity attached to a request.

use uuid::Uuid;

use super::errors::ResolveError;
use crate::db::UserRole;
use crate::jwt::SessionClaims;

/// Who is making the current request. Lives in the request's extensions
/// for exactly as long as the request does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPrincipal {
    pub user_id: Uuid,
    pub display_name: String,
    pub role: UserRole,
}

impl RequestPrincipal {
    /// Build a principal from verified claims. The role must name a known role.
    pub fn resolve(claims: &SessionClaims) -> Result<Self, ResolveError> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ResolveError::BadSubject(claims.sub.clone()))?;
        let role = claims
            .role
            .parse()
            .map_err(|_| ResolveError::UnknownRole(claims.role.clone()))?;

        Ok(Self {
            user_id,
            display_name: claims.username.clone(),
            role,
        })
    }

    /// Admins satisfy every role requirement.
    pub fn has_role(&self, required: UserRole) -> bool {
        self.role == required || self.role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str, role: &str) -> SessionClaims {
        SessionClaims {
            jti: Uuid::new_v4().to_string(),
            sub: sub.to_string(),
            role: role.to_string(),
            username: "alice".to_string(),
            iat: 0,
            exp: 1,
            iss: "bookstore".to_string(),
        }
    }

    #[test]
    fn test_resolve() {
        let id = Uuid::new_v4();
        let principal = RequestPrincipal::resolve(&claims(&id.to_string(), "ADMIN")).unwrap();

        assert_eq!(principal.user_id, id);
        assert_eq!(principal.display_name, "alice");
        assert_eq!(principal.role, UserRole::Admin);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result = RequestPrincipal::resolve(&claims(&Uuid::new_v4().to_string(), "ROOT"));
        assert_eq!(result, Err(ResolveError::UnknownRole("ROOT".into())));
    }

    #[test]
    fn test_bad_subject_rejected() {
        let result = RequestPrincipal::resolve(&claims("alice", "USER"));
        assert!(matches!(result, Err(ResolveError::BadSubject(_))));
    }

    #[test]
    fn test_role_satisfaction() {
        let user = RequestPrincipal::resolve(&claims(&Uuid::new_v4().to_string(), "USER")).unwrap();
        let admin =
            RequestPrincipal::resolve(&claims(&Uuid::new_v4().to_string(), "ADMIN")).unwrap();

        assert!(user.has_role(UserRole::User));
        assert!(!user.has_role(UserRole::Admin));
        assert!(admin.has_role(UserRole::User));
        assert!(admin.has_role(UserRole::Admin));
    }
}
