//! CLI argument parsing, validation, and startup helpers.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::{error, info};
use url::Url;

use crate::ServerConfig;
use crate::db::{Database, NewUser, UserRole};
use crate::mail::LogMailer;
use crate::password::hash_password;
use crate::rate_limit::RateLimits;

const MIN_SECRET_LENGTH: usize = 32;
const ADMIN_PASSWORD_LENGTH: usize = 24;

pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const EMAIL_SECRET_ENV: &str = "EMAIL_TOKEN_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "bookstore", about = "Bookstore API with bearer-token authentication")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "BOOKSTORE_PORT", default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file (":memory:" for a throwaway database)
    #[arg(short, long, env = "BOOKSTORE_DATABASE", default_value = "bookstore.db")]
    pub database: String,

    /// Issuer name stamped into and required of every session token
    #[arg(long, env = "BOOKSTORE_ISSUER", default_value = "bookstore")]
    pub issuer: String,

    /// Session token lifetime in seconds
    #[arg(long, env = "BOOKSTORE_SESSION_TTL", default_value = "3600", value_parser = parse_ttl)]
    pub session_ttl: u64,

    /// Email verification token lifetime in seconds
    #[arg(long, env = "BOOKSTORE_EMAIL_TOKEN_TTL", default_value = "86400", value_parser = parse_ttl)]
    pub email_token_ttl: u64,

    /// Public base URL, used to build verification links
    #[arg(long, env = "BOOKSTORE_PUBLIC_URL", default_value = "http://localhost:7291")]
    pub public_url: String,

    /// Path to file containing the session token secret. Prefer the JWT_SECRET env var
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Path to file containing the email token secret. Prefer the EMAIL_TOKEN_SECRET env var
    #[arg(long)]
    pub email_secret_file: Option<String>,

    /// Login attempts allowed per client IP per minute
    #[arg(long, env = "BOOKSTORE_LOGIN_PER_MINUTE", default_value = "10")]
    pub login_per_minute: NonZeroU32,

    /// Registrations allowed per client IP per minute
    #[arg(long, env = "BOOKSTORE_REGISTER_PER_MINUTE", default_value = "3")]
    pub register_per_minute: NonZeroU32,

    /// Create an enabled admin with this username on startup and print its password
    #[arg(long, value_name = "USERNAME")]
    pub create_admin: Option<String>,

    /// Email address for the admin created by --create-admin
    #[arg(long, requires = "create_admin")]
    pub admin_email: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn parse_ttl(s: &str) -> Result<u64, String> {
    match s.parse::<u64>() {
        Ok(0) => Err("TTL must be at least one second".to_string()),
        Ok(secs) => Ok(secs),
        Err(e) => Err(format!("Invalid TTL '{}': {}", s, e)),
    }
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a signing secret from an environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, file: Option<&str>, flag: &str) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the environment variable (recommended) or use {}",
            env_var, flag
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both secrets and make sure they differ.
pub fn load_secrets(args: &Args) -> Option<(String, String)> {
    let jwt_secret = load_secret(
        JWT_SECRET_ENV,
        args.jwt_secret_file.as_deref(),
        "--jwt-secret-file",
    )?;
    let email_secret = load_secret(
        EMAIL_SECRET_ENV,
        args.email_secret_file.as_deref(),
        "--email-secret-file",
    )?;

    if jwt_secret == email_secret {
        error!("{} and {} must be different", JWT_SECRET_ENV, EMAIL_SECRET_ENV);
        return None;
    }

    Some((jwt_secret, email_secret))
}

/// Parse and validate the public URL.
/// Returns None and logs an error if validation fails.
pub fn validate_public_url(public_url: &str) -> Option<Url> {
    let url = match Url::parse(public_url) {
        Ok(url) => url,
        Err(e) => {
            error!(url = %public_url, error = %e, "Invalid public URL");
            return None;
        }
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        error!(url = %public_url, "Public URL must be http or https");
        return None;
    }

    Some(url)
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ADMIN_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Handle the --create-admin flag: create an enabled, verified admin and print
/// its generated password once. An existing account with that name is left alone.
pub async fn handle_create_admin(db: &Database, username: &str, email: Option<&str>) {
    match db.users().get_by_username(username).await {
        Ok(Some(existing)) => {
            println!();
            println!(
                "User already exists: {} ({})",
                existing.username,
                existing.role.as_str()
            );
            println!();
        }
        Ok(None) => {
            let password = generate_password();
            let password_hash = match hash_password(&password) {
                Ok(hash) => hash,
                Err(e) => {
                    error!(error = %e, "Failed to hash admin password");
                    std::process::exit(1);
                }
            };
            let email = email
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}@localhost", username));

            let created = db
                .users()
                .create(NewUser {
                    username,
                    email: &email,
                    password_hash: &password_hash,
                    role: UserRole::Admin,
                    enabled: true,
                    verified: true,
                    verification_token: None,
                })
                .await;

            match created {
                Ok(_) => {
                    println!();
                    println!("Admin user created: {}", username);
                    println!("Password: {}", password);
                    println!();
                }
                Err(e) => {
                    error!(error = %e, "Failed to create admin user");
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to check for existing admin");
            std::process::exit(1);
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    public_url: Url,
    jwt_secret: String,
    email_secret: String,
) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        email_secret: email_secret.into_bytes(),
        issuer: args.issuer.clone(),
        session_ttl: Duration::from_secs(args.session_ttl),
        email_token_ttl: Duration::from_secs(args.email_token_ttl),
        public_url,
        rate_limits: RateLimits {
            login_per_minute: args.login_per_minute,
            register_per_minute: args.register_per_minute,
        },
        mailer: Arc::new(LogMailer),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["bookstore"]);

        assert_eq!(args.port, 7291);
        assert_eq!(args.issuer, "bookstore");
        assert_eq!(args.session_ttl, 3600);
        assert_eq!(args.email_token_ttl, 86400);
        assert!(args.create_admin.is_none());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        assert!(Args::try_parse_from(["bookstore", "--session-ttl", "0"]).is_err());
        assert!(parse_ttl("abc").is_err());
        assert_eq!(parse_ttl("60"), Ok(60));
    }

    #[test]
    fn test_admin_email_requires_create_admin() {
        assert!(Args::try_parse_from(["bookstore", "--admin-email", "a@example.com"]).is_err());
        assert!(
            Args::try_parse_from([
                "bookstore",
                "--create-admin",
                "root",
                "--admin-email",
                "a@example.com"
            ])
            .is_ok()
        );
    }

    #[test]
    fn test_validate_public_url() {
        assert!(validate_public_url("https://books.example.com").is_some());
        assert!(validate_public_url("http://localhost:7291").is_some());
        assert!(validate_public_url("ftp://example.com").is_none());
        assert!(validate_public_url("not a url").is_none());
    }

    #[test]
    fn test_generated_password() {
        let password = generate_password();
        assert_eq!(password.len(), ADMIN_PASSWORD_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(password, generate_password());
    }

    #[tokio::test]
    async fn test_create_admin() {
        let db = Database::open(":memory:").await.unwrap();
        handle_create_admin(&db, "root", None).await;

        let admin = db.users().get_by_username("root").await.unwrap().unwrap();
        assert_eq!(admin.role, UserRole::Admin);
        assert!(admin.enabled);
        assert!(admin.verified);
        assert_eq!(admin.email, "root@localhost");

        // Running again leaves the account untouched.
        handle_create_admin(&db, "root", None).await;
        assert_eq!(db.users().list().await.unwrap().len(), 1);
    }
}
