use std::str::FromStr;

use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    User,
    Admin,
}

/// A role string that does not name any [`UserRole`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Admin => "ADMIN",
        }
    }
}

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(UserRole::User),
            "ADMIN" => Ok(UserRole::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Stored credential record.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub enabled: bool,
    pub verified: bool,
    pub verification_token: Option<String>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    enabled: i32,
    verified: i32,
    verification_token: Option<String>,
}

impl TryFrom<UserRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&row.id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
            role: row
                .role
                .parse()
                .map_err(|e: UnknownRole| sqlx::Error::Decode(Box::new(e)))?,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            enabled: row.enabled != 0,
            verified: row.verified != 0,
            verification_token: row.verification_token,
        })
    }
}

/// Public account summary. Never carries the password hash or verification token.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub enabled: bool,
    pub verified: bool,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct UserSummaryRow {
    id: String,
    username: String,
    email: String,
    role: String,
    enabled: i32,
    verified: i32,
    created_at: String,
}

impl TryFrom<UserSummaryRow> for UserSummary {
    type Error = sqlx::Error;

    fn try_from(row: UserSummaryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: row
                .role
                .parse()
                .map_err(|e: UnknownRole| sqlx::Error::Decode(Box::new(e)))?,
            id: row.id,
            username: row.username,
            email: row.email,
            enabled: row.enabled != 0,
            verified: row.verified != 0,
            created_at: row.created_at,
        })
    }
}

/// Fields for a new account.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: UserRole,
    pub enabled: bool,
    pub verified: bool,
    pub verification_token: Option<&'a str>,
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, enabled, verified, verification_token";

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new account. Returns the generated ID.
    pub async fn create(&self, user: NewUser<'_>) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, role, enabled, verified, verification_token)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.role.as_str())
        .bind(user.enabled as i32)
        .bind(user.verified as i32)
        .bind(user.verification_token)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE {} = ?",
            USER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    /// Get an account by ID.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        self.fetch_one_by("id", &id.to_string()).await
    }

    /// Get an account by username (case-insensitive).
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        self.fetch_one_by("username", username).await
    }

    /// Get an account by email address (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        self.fetch_one_by("email", email).await
    }

    /// Check whether a username is already taken.
    pub async fn is_username_taken(&self, username: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// Flip an account to verified and enabled, clearing its verification token.
    /// Last writer wins; there is no compare-and-set on the stored token.
    pub async fn mark_verified(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users
             SET verified = 1, enabled = 1, verification_token = NULL, updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Enable or disable an account.
    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET enabled = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(enabled as i32)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set the role for an account.
    pub async fn set_role(&self, id: Uuid, role: UserRole) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET role = ?, updated_at = datetime('now') WHERE id = ?")
                .bind(role.as_str())
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get the public summary of one account.
    pub async fn get_summary(&self, id: Uuid) -> Result<Option<UserSummary>, sqlx::Error> {
        let row: Option<UserSummaryRow> = sqlx::query_as(
            "SELECT id, username, email, role, enabled, verified, created_at FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserSummary::try_from).transpose()
    }

    /// List all accounts (for the admin dashboard).
    pub async fn list(&self) -> Result<Vec<UserSummary>, sqlx::Error> {
        let rows: Vec<UserSummaryRow> = sqlx::query_as(
            "SELECT id, username, email, role, enabled, verified, created_at FROM users ORDER BY created_at, username",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(UserSummary::try_from).collect()
    }
}
