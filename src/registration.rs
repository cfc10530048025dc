//! Account registration and email verification.
//!
//! A new account starts disabled and unverified, holding the email token
//! that was mailed to it. Presenting that token flips the account to
//! verified and enabled and clears the stored copy, so the same string
//! cannot verify twice.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::db::{Database, NewUser, UserRole};
use crate::email_token::EmailTokenCodec;
use crate::jwt::IssueError;
use crate::mail::{Mailer, verification_link};
use crate::password::{PasswordError, hash_password};

/// Validated registration input.
pub struct RegistrationRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// What a registration attempt did. None of these are errors: each maps to a
/// status message for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Account created and verification mail dispatched.
    Registered { username: String },
    /// The email already belongs to a verified account.
    AlreadyVerified { username: String },
    /// The email already belongs to an account awaiting verification.
    PendingVerification { username: String },
    UsernameTaken { username: String },
}

impl RegistrationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Registered { .. } | Self::AlreadyVerified { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Self::Registered { username } => {
                format!("User {} registered. Please verify your email", username)
            }
            Self::AlreadyVerified { username } => format!("User {} exists", username),
            Self::PendingVerification { username } => {
                format!("User {} exists but is not verified", username)
            }
            Self::UsernameTaken { username } => format!("Username {} is already taken", username),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error("failed to issue email token: {0}")]
    Token(#[from] IssueError),
    #[error("password hashing did not complete: {0}")]
    Hasher(#[from] tokio::task::JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("token does not match the stored token")]
    TokenMismatch,
    #[error("token expired")]
    TokenExpired,
    #[error("no account for this token")]
    AccountNotFound,
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl VerificationError {
    /// Stable code for the response payload. `None` for server-side failures.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::TokenMismatch => Some("token_mismatch"),
            Self::TokenExpired => Some("token_expired"),
            Self::AccountNotFound => Some("account_not_found"),
            Self::Store(_) => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::TokenMismatch => "Verification token is not valid for this account",
            Self::TokenExpired => "Verification token has expired",
            Self::AccountNotFound => "No account found for this verification token",
            Self::Store(_) => "Verification failed",
        }
    }
}

#[derive(Clone)]
pub struct RegistrationService {
    db: Database,
    email_tokens: Arc<EmailTokenCodec>,
    mailer: Arc<dyn Mailer>,
    public_url: url::Url,
}

impl RegistrationService {
    pub fn new(
        db: Database,
        email_tokens: Arc<EmailTokenCodec>,
        mailer: Arc<dyn Mailer>,
        public_url: url::Url,
    ) -> Self {
        Self {
            db,
            email_tokens,
            mailer,
            public_url,
        }
    }

    /// Register a new account and send it a verification link.
    pub async fn register(
        &self,
        request: RegistrationRequest<'_>,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let users = self.db.users();

        if let Some(existing) = users.get_by_email(request.email).await? {
            let username = existing.username;
            return Ok(if existing.verified {
                RegistrationOutcome::AlreadyVerified { username }
            } else {
                RegistrationOutcome::PendingVerification { username }
            });
        }

        if users.is_username_taken(request.username).await? {
            return Ok(RegistrationOutcome::UsernameTaken {
                username: request.username.to_string(),
            });
        }

        let password = request.password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;
        let token = self.email_tokens.issue(request.email)?;

        let created = users
            .create(NewUser {
                username: request.username,
                email: request.email,
                password_hash: &password_hash,
                role: UserRole::User,
                enabled: false,
                verified: false,
                verification_token: Some(&token),
            })
            .await;

        let user_id = match created {
            Ok(id) => id,
            // Lost a race with a concurrent registration for the same name or address.
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Ok(RegistrationOutcome::UsernameTaken {
                    username: request.username.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        info!(username = request.username, %user_id, "Account registered");

        let link = verification_link(&self.public_url, &token);
        if let Err(e) = self.mailer.send_verification(request.email, &link).await {
            warn!(username = request.username, error = %e, "Failed to send verification mail");
        }

        Ok(RegistrationOutcome::Registered {
            username: request.username.to_string(),
        })
    }

    /// Verify the account an email token was issued for.
    ///
    /// Checks run in order: the token must carry a subject under a valid
    /// signature, that subject must name an account, the token must equal
    /// the one stored on the account, and only then is expiry considered.
    pub async fn verify(&self, token: &str) -> Result<(), VerificationError> {
        let email = match self.email_tokens.extract_subject(token) {
            Ok(email) => email,
            Err(e) => {
                warn!(error = %e, "Verification with undecodable token");
                return Err(VerificationError::TokenMismatch);
            }
        };

        let users = self.db.users();
        let Some(user) = users.get_by_email(&email).await? else {
            warn!(email, "Verification for unknown account");
            return Err(VerificationError::AccountNotFound);
        };

        let matches = match user.verification_token.as_deref() {
            Some(stored) => bool::from(stored.as_bytes().ct_eq(token.as_bytes())),
            None => false,
        };
        if !matches {
            warn!(username = user.username, "Verification token mismatch");
            return Err(VerificationError::TokenMismatch);
        }

        if self.email_tokens.is_expired(token) {
            warn!(username = user.username, "Verification token expired");
            return Err(VerificationError::TokenExpired);
        }

        users.mark_verified(user.id).await?;
        info!(username = user.username, user_id = %user.id, "Email verified");
        Ok(())
    }
}
