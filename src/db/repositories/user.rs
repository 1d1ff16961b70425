//! User repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Case-insensitive e-mail lookup
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based user repository
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_user_sqlite(p, user).await,
            Backend::Mysql(p) => create_user_mysql(p, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(
                    "SELECT id, username, email, password_hash, created_at, updated_at FROM users WHERE id = ?",
                )
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get user by ID")?;
                Ok(row.map(|r| row_to_user_sqlite(&r)))
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(
                    "SELECT id, username, email, password_hash, created_at, updated_at FROM users WHERE id = ?",
                )
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get user by ID")?;
                Ok(row.map(|r| row_to_user_mysql(&r)))
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(
                    "SELECT id, username, email, password_hash, created_at, updated_at FROM users WHERE username = ?",
                )
                .bind(username)
                .fetch_optional(p)
                .await
                .context("Failed to get user by username")?;
                Ok(row.map(|r| row_to_user_sqlite(&r)))
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(
                    "SELECT id, username, email, password_hash, created_at, updated_at FROM users WHERE username = ?",
                )
                .bind(username)
                .fetch_optional(p)
                .await
                .context("Failed to get user by username")?;
                Ok(row.map(|r| row_to_user_mysql(&r)))
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_lowercase();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                let row = sqlx::query(
                    "SELECT id, username, email, password_hash, created_at, updated_at FROM users WHERE LOWER(email) = ?",
                )
                .bind(&email)
                .fetch_optional(p)
                .await
                .context("Failed to get user by email")?;
                Ok(row.map(|r| row_to_user_sqlite(&r)))
            }
            Backend::Mysql(p) => {
                let row = sqlx::query(
                    "SELECT id, username, email, password_hash, created_at, updated_at FROM users WHERE LOWER(email) = ?",
                )
                .bind(&email)
                .fetch_optional(p)
                .await
                .context("Failed to get user by email")?;
                Ok(row.map(|r| row_to_user_mysql(&r)))
            }
        }
    }

    async fn count(&self) -> Result<i64> {
        let count = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(p).await,
            Backend::Mysql(p) => sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(p).await,
        };
        count.context("Failed to count users")
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxUserRepository::new(pool)
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let repo = setup_test_repo().await;
        let created = repo
            .create(&User::new("leifos".into(), "Leif@Example.com".into(), "hash".into()))
            .await
            .unwrap();
        assert!(created.id > 0);

        assert_eq!(repo.get_by_id(created.id).await.unwrap().unwrap().username, "leifos");
        assert!(repo.get_by_username("leifos").await.unwrap().is_some());
        assert!(repo.get_by_username("LEIFOS").await.unwrap().is_none());
        assert!(repo.get_by_email("leif@example.com").await.unwrap().is_some());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let repo = setup_test_repo().await;
        repo.create(&User::new("dup".into(), "a@example.com".into(), "h".into()))
            .await
            .unwrap();
        let second = repo
            .create(&User::new("dup".into(), "b@example.com".into(), "h".into()))
            .await;
        assert!(second.is_err());
    }
}
