#![allow(dead_code)]

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use bookstore::db::{Database, NewUser, UserRole};
use bookstore::jwt::TokenCodec;
use bookstore::mail::{MailError, Mailer};
use bookstore::password::hash_password;
use bookstore::rate_limit::RateLimits;
use bookstore::{ServerConfig, create_app};
use url::Url;
use uuid::Uuid;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough";
pub const EMAIL_SECRET: &[u8] = b"test-email-secret-that-is-long-enough";
pub const ISSUER: &str = "bookstore";
pub const PASSWORD: &str = "correct horse battery";
pub const HOUR: Duration = Duration::from_secs(3600);

/// Captures verification mail instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, Url)>>,
}

impl RecordingMailer {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_recipient(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(to, _)| to.clone())
    }

    /// The token from the most recent verification link.
    pub fn last_token(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let (_, link) = sent.last()?;
        link.query_pairs()
            .find(|(k, _)| k == "token")
            .map(|(_, v)| v.into_owned())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_verification(&self, to: &str, link: &Url) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), link.clone()));
        Ok(())
    }
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub mailer: Arc<RecordingMailer>,
}

pub fn generous_limits() -> RateLimits {
    RateLimits {
        login_per_minute: NonZeroU32::new(1000).unwrap(),
        register_per_minute: NonZeroU32::new(1000).unwrap(),
    }
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with_limits(generous_limits()).await
}

pub async fn create_test_app_with_limits(rate_limits: RateLimits) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let mailer = Arc::new(RecordingMailer::default());
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: JWT_SECRET.to_vec(),
        email_secret: EMAIL_SECRET.to_vec(),
        issuer: ISSUER.to_string(),
        session_ttl: HOUR,
        email_token_ttl: Duration::from_secs(86400),
        public_url: Url::parse("http://localhost:7291").expect("Invalid URL"),
        rate_limits,
        mailer: mailer.clone(),
    };
    TestApp {
        app: create_app(&config),
        db,
        mailer,
    }
}

pub fn token_codec() -> TokenCodec {
    TokenCodec::new(JWT_SECRET, ISSUER)
}

/// Insert an account with password [`PASSWORD`].
pub async fn create_user(db: &Database, username: &str, role: UserRole, enabled: bool) -> Uuid {
    let hash = hash_password(PASSWORD).unwrap();
    let email = format!("{}@example.com", username);
    db.users()
        .create(NewUser {
            username,
            email: &email,
            password_hash: &hash,
            role,
            enabled,
            verified: enabled,
            verification_token: None,
        })
        .await
        .unwrap()
}

/// A valid session token for an existing account.
pub fn session_token(id: Uuid, username: &str, role: UserRole) -> String {
    token_codec().issue(id, role, username, HOUR).unwrap().token
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
