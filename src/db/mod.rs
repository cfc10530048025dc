mod user;

use std::time::Duration;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use user::{NewUser, UnknownRole, User, UserRole, UserStore, UserSummary};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let pool = if path == ":memory:" {
            // Every connection to sqlite::memory: is a separate database, so pin one.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect("sqlite::memory:")
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect(&format!("sqlite:{}?mode=rwc", path))
                .await?
        };

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id TEXT PRIMARY KEY NOT NULL,
                    username TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'USER',
                    enabled INTEGER NOT NULL DEFAULT 0,
                    verified INTEGER NOT NULL DEFAULT 0,
                    verification_token TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_username ON users(username)",
                "CREATE INDEX idx_users_email ON users(email)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user<'a>(username: &'a str, email: &'a str) -> NewUser<'a> {
        NewUser {
            username,
            email,
            password_hash: "hash",
            role: UserRole::User,
            enabled: false,
            verified: false,
            verification_token: Some("token-abc"),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .users()
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let user = db.users().get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.role, UserRole::User);
        assert!(!user.enabled);
        assert!(!user.verified);
        assert_eq!(user.verification_token.as_deref(), Some("token-abc"));

        let user = db.users().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.username, "alice");

        let user = db
            .users()
            .get_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, id);
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let db = Database::open(":memory:").await.unwrap();
        db.users()
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        assert!(db.users().get_by_username("ALICE").await.unwrap().is_some());
        assert!(
            db.users()
                .get_by_email("Alice@Example.com")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_mark_verified_clears_token() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .users()
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        assert!(db.users().mark_verified(id).await.unwrap());

        let user = db.users().get_by_id(id).await.unwrap().unwrap();
        assert!(user.verified);
        assert!(user.enabled);
        assert!(user.verification_token.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.users()
            .create(new_user("alice", "a1@example.com"))
            .await
            .unwrap();
        let result = db.users().create(new_user("alice", "a2@example.com")).await;

        assert!(result.is_err());
        assert!(db.users().is_username_taken("alice").await.unwrap());
        assert!(!db.users().is_username_taken("bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_role_in_row_is_decode_error() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .users()
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        sqlx::query("UPDATE users SET role = 'SUPERUSER' WHERE id = ?")
            .bind(id.to_string())
            .execute(db.pool())
            .await
            .unwrap();

        assert!(db.users().get_by_id(id).await.is_err());
    }

    #[tokio::test]
    async fn test_set_enabled_and_role() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .users()
            .create(new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        db.users().set_enabled(id, true).await.unwrap();
        db.users().set_role(id, UserRole::Admin).await.unwrap();

        let summary = db.users().get_summary(id).await.unwrap().unwrap();
        assert!(summary.enabled);
        assert_eq!(summary.role, UserRole::Admin);
        assert_eq!(db.users().list().await.unwrap().len(), 1);
    }
}
