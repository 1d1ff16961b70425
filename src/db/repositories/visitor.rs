//! Visitor session repository
//!
//! Backing store for anonymous visit counting.

use crate::db::{Backend, DynDatabasePool};
use crate::models::VisitorSession;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait VisitorSessionRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<VisitorSession>>;

    /// Insert the session or overwrite the stored one with the same key
    async fn save(&self, session: &VisitorSession) -> Result<()>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

pub struct SqlxVisitorSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxVisitorSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn VisitorSessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl VisitorSessionRepository for SqlxVisitorSessionRepository {
    async fn get(&self, key: &str) -> Result<Option<VisitorSession>> {
        const SQL: &str = "SELECT session_key, visits, last_visit, expires_at FROM visitor_sessions WHERE session_key = ?";
        let session = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query(SQL)
                .bind(key)
                .fetch_optional(p)
                .await
                .context("Failed to load visitor session")?
                .map(|row| VisitorSession {
                    key: row.get("session_key"),
                    visits: row.get("visits"),
                    last_visit: row.get("last_visit"),
                    expires_at: row.get("expires_at"),
                }),
            Backend::Mysql(p) => sqlx::query(SQL)
                .bind(key)
                .fetch_optional(p)
                .await
                .context("Failed to load visitor session")?
                .map(|row| VisitorSession {
                    key: row.get("session_key"),
                    visits: row.get("visits"),
                    last_visit: row.get("last_visit"),
                    expires_at: row.get("expires_at"),
                }),
        };
        Ok(session)
    }

    async fn save(&self, session: &VisitorSession) -> Result<()> {
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(
                    r#"
                    INSERT INTO visitor_sessions (session_key, visits, last_visit, expires_at)
                    VALUES (?, ?, ?, ?)
                    ON CONFLICT(session_key) DO UPDATE SET
                        visits = excluded.visits,
                        last_visit = excluded.last_visit,
                        expires_at = excluded.expires_at
                    "#,
                )
                .bind(&session.key)
                .bind(session.visits)
                .bind(session.last_visit)
                .bind(session.expires_at)
                .execute(p)
                .await
                .context("Failed to save visitor session")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(
                    r#"
                    INSERT INTO visitor_sessions (session_key, visits, last_visit, expires_at)
                    VALUES (?, ?, ?, ?)
                    ON DUPLICATE KEY UPDATE
                        visits = VALUES(visits),
                        last_visit = VALUES(last_visit),
                        expires_at = VALUES(expires_at)
                    "#,
                )
                .bind(&session.key)
                .bind(session.visits)
                .bind(session.last_visit)
                .bind(session.expires_at)
                .execute(p)
                .await
                .context("Failed to save visitor session")?;
            }
        }
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query("DELETE FROM visitor_sessions WHERE expires_at <= ?")
                .bind(now)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(p) => sqlx::query("DELETE FROM visitor_sessions WHERE expires_at <= ?")
                .bind(now)
                .execute(p)
                .await
                .map(|r| r.rows_affected()),
        };
        result.context("Failed to delete expired visitor sessions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup() -> SqlxVisitorSessionRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxVisitorSessionRepository::new(pool)
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_key() {
        let repo = setup().await;
        let now = Utc::now();
        let mut session = VisitorSession::start(now);
        repo.save(&session).await.unwrap();

        session.visits = 4;
        repo.save(&session).await.unwrap();

        let loaded = repo.get(&session.key).await.unwrap().unwrap();
        assert_eq!(loaded.visits, 4);
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let repo = setup().await;
        let now = Utc::now();
        let stale = VisitorSession::start(now - Duration::days(30));
        let live = VisitorSession::start(now);
        repo.save(&stale).await.unwrap();
        repo.save(&live).await.unwrap();

        assert_eq!(repo.delete_expired(now).await.unwrap(), 1);
        assert!(repo.get(&stale.key).await.unwrap().is_none());
        assert!(repo.get(&live.key).await.unwrap().is_some());
    }
}
