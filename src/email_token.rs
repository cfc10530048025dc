//! Short-lived email verification tokens.
//!
//! Signed with their own secret so a session token can never stand in for
//! one. Possession of a valid token is not enough on its own: callers must
//! also match it against the token stored on the account, which is cleared
//! after a successful verification.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::jwt::{IssueError, unix_now};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailClaims {
    /// Email address the token was sent to
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

/// The token could not be decoded or its signature did not check out.
#[derive(Debug, thiserror::Error)]
#[error("invalid email token: {0}")]
pub struct EmailTokenError(#[from] jsonwebtoken::errors::Error);

#[derive(Clone)]
pub struct EmailTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl EmailTokenCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Issue a verification token for `email`.
    pub fn issue(&self, email: &str) -> Result<String, IssueError> {
        self.issue_at(email, unix_now()?)
    }

    pub fn issue_at(&self, email: &str, now: u64) -> Result<String, IssueError> {
        let claims = EmailClaims {
            sub: email.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Decode and check the signature, ignoring expiry.
    fn decode(&self, token: &str) -> Result<EmailClaims, EmailTokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(jsonwebtoken::decode::<EmailClaims>(token, &self.decoding_key, &validation)?.claims)
    }

    /// Whether the token is past its expiry. Undecodable tokens count as expired.
    pub fn is_expired(&self, token: &str) -> bool {
        self.is_expired_at(token, unix_now().unwrap_or(u64::MAX))
    }

    pub fn is_expired_at(&self, token: &str, now: u64) -> bool {
        match self.decode(token) {
            Ok(claims) => claims.exp <= now,
            Err(_) => true,
        }
    }

    /// Extract the email address from a correctly signed token, expired or not.
    /// Not an authorization decision by itself.
    pub fn extract_subject(&self, token: &str) -> Result<String, EmailTokenError> {
        self.decode(token).map(|claims| claims.sub)
    }
}
