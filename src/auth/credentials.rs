//! Username/password checking at login.

use std::sync::LazyLock;

use tokio::task::JoinError;
use tracing::{info, warn};
use uuid::Uuid;

use super::errors::CredentialError;
use crate::db::{Database, UserRole};
use crate::password::{hash_password, verify_password};

/// Stand-in hash for accounts that never reach the real password check.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("placeholder password").ok());

/// An account whose credentials were just accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_id: Uuid,
    pub role: UserRole,
    pub username: String,
}

#[derive(Clone)]
pub struct CredentialVerifier {
    db: Database,
}

impl CredentialVerifier {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Check a username/password pair.
    ///
    /// Checks run in a fixed order: the account must exist, then be enabled,
    /// then the password must match. Nothing is modified.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<VerifiedIdentity, CredentialError> {
        let user = match self.db.users().get_by_username(username).await? {
            Some(user) => user,
            None => {
                check_password(password, None).await?;
                warn!(username, "Login failed: unknown user");
                return Err(CredentialError::UnknownUser);
            }
        };

        if !user.enabled {
            check_password(password, None).await?;
            warn!(username, "Login failed: account disabled");
            return Err(CredentialError::AccountDisabled);
        }

        if !check_password(password, Some(&user.password_hash)).await? {
            warn!(username, "Login failed: bad credentials");
            return Err(CredentialError::BadCredentials);
        }

        info!(username, user_id = %user.id, "Login succeeded");
        Ok(VerifiedIdentity {
            user_id: user.id,
            role: user.role,
            username: user.username,
        })
    }
}

/// Run Argon2 on the blocking pool.
///
/// Without a stored hash the password is checked against [`DUMMY_HASH`] and
/// the result is always `false`, so every failed login does the same work.
async fn check_password(password: &str, stored: Option<&str>) -> Result<bool, JoinError> {
    let password = password.to_string();
    let stored = stored.map(str::to_string);

    tokio::task::spawn_blocking(move || match stored {
        Some(hash) => verify_password(&password, &hash),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                verify_password(&password, dummy);
            }
            false
        }
    })
    .await
}
