//! Session token issuance and verification.
//!
//! Tokens are HS256 JWTs signed with a process-wide secret. Verification never
//! returns an error: every way an untrusted string can fail is a
//! [`VerificationOutcome`] variant.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::UserRole;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Token ID, fresh per issuance
    pub jti: String,
    /// Subject (account UUID)
    pub sub: String,
    /// Role name; validated when the principal is resolved
    pub role: String,
    pub username: String,
    /// Issued at (Unix seconds)
    pub iat: u64,
    /// Expiration time (Unix seconds)
    pub exp: u64,
    pub iss: String,
}

/// A freshly signed session token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: Uuid,
    /// Unix seconds
    pub issued_at: u64,
    /// Unix seconds
    pub expires_at: u64,
}

/// Result of checking one presented token. Exactly one variant per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Valid(SessionClaims),
    Expired,
    Malformed,
    SignatureInvalid,
}

/// Errors that can occur while issuing a token.
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("failed to encode token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error("system time error")]
    Time,
}

/// Current Unix time in seconds.
pub fn unix_now() -> Result<u64, IssueError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| IssueError::Time)
}

/// Signs and checks session tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl TokenCodec {
    /// Create a codec from the signing secret and the issuer name stamped into every token.
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
        }
    }

    /// Issue a session token valid for `ttl` from now.
    pub fn issue(
        &self,
        subject: Uuid,
        role: UserRole,
        username: &str,
        ttl: Duration,
    ) -> Result<IssuedToken, IssueError> {
        self.issue_at(subject, role, username, ttl, unix_now()?)
    }

    /// Issue a session token as if the current time were `now`.
    pub fn issue_at(
        &self,
        subject: Uuid,
        role: UserRole,
        username: &str,
        ttl: Duration,
        now: u64,
    ) -> Result<IssuedToken, IssueError> {
        let token_id = Uuid::new_v4();
        let exp = now.saturating_add(ttl.as_secs());

        let claims = SessionClaims {
            jti: token_id.to_string(),
            sub: subject.to_string(),
            role: role.as_str().to_string(),
            username: username.to_string(),
            iat: now,
            exp,
            iss: self.issuer.clone(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(IssuedToken {
            token,
            token_id,
            issued_at: now,
            expires_at: exp,
        })
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> VerificationOutcome {
        // An unreadable clock treats every token as expired.
        self.verify_at(token, unix_now().unwrap_or(u64::MAX))
    }

    /// Verify a token as if the current time were `now`.
    pub fn verify_at(&self, token: &str, now: u64) -> VerificationOutcome {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // Expiry is judged below against `now`, not the library's clock.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let claims = match jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
        {
            Ok(data) => data.claims,
            Err(e) => {
                return match e.kind() {
                    ErrorKind::InvalidSignature => VerificationOutcome::SignatureInvalid,
                    _ => VerificationOutcome::Malformed,
                };
            }
        };

        if claims.exp <= now {
            return VerificationOutcome::Expired;
        }

        VerificationOutcome::Valid(claims)
    }
}
