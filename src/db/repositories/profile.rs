//! User profile repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ProfileWithUser, UserProfile};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn create(&self, profile: &UserProfile) -> Result<UserProfile>;

    async fn get_by_user_id(&self, user_id: i64) -> Result<Option<UserProfile>>;

    /// Persist website and picture changes
    async fn update(&self, profile: &UserProfile) -> Result<UserProfile>;

    /// Every profile with its owner's username, ordered by username
    async fn list(&self) -> Result<Vec<ProfileWithUser>>;
}

pub struct SqlxProfileRepository {
    pool: DynDatabasePool,
}

impl SqlxProfileRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProfileRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProfileRepository for SqlxProfileRepository {
    async fn create(&self, profile: &UserProfile) -> Result<UserProfile> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_profile_sqlite(p, profile).await,
            Backend::Mysql(p) => create_profile_mysql(p, profile).await,
        }
    }

    async fn get_by_user_id(&self, user_id: i64) -> Result<Option<UserProfile>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_profile_by_user_sqlite(p, user_id).await,
            Backend::Mysql(p) => get_profile_by_user_mysql(p, user_id).await,
        }
    }

    async fn update(&self, profile: &UserProfile) -> Result<UserProfile> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query(
                    "UPDATE user_profiles SET website = ?, picture = ?, updated_at = ? WHERE user_id = ?",
                )
                .bind(&profile.website)
                .bind(&profile.picture)
                .bind(now)
                .bind(profile.user_id)
                .execute(p)
                .await
                .context("Failed to update profile")?;
            }
            Backend::Mysql(p) => {
                sqlx::query(
                    "UPDATE user_profiles SET website = ?, picture = ?, updated_at = ? WHERE user_id = ?",
                )
                .bind(&profile.website)
                .bind(&profile.picture)
                .bind(now)
                .bind(profile.user_id)
                .execute(p)
                .await
                .context("Failed to update profile")?;
            }
        }
        Ok(UserProfile {
            updated_at: now,
            ..profile.clone()
        })
    }

    async fn list(&self) -> Result<Vec<ProfileWithUser>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_profiles_sqlite(p).await,
            Backend::Mysql(p) => list_profiles_mysql(p).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_profile_sqlite(pool: &SqlitePool, profile: &UserProfile) -> Result<UserProfile> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO user_profiles (user_id, website, picture, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(profile.user_id)
    .bind(&profile.website)
    .bind(&profile.picture)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create profile")?;

    Ok(UserProfile {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..profile.clone()
    })
}

async fn get_profile_by_user_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Option<UserProfile>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, website, picture, created_at, updated_at
        FROM user_profiles WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get profile")?;

    Ok(row.map(|r| row_to_profile_sqlite(&r)))
}

async fn list_profiles_sqlite(pool: &SqlitePool) -> Result<Vec<ProfileWithUser>> {
    let rows = sqlx::query(
        r#"
        SELECT p.id, p.user_id, p.website, p.picture, p.created_at, p.updated_at, u.username
        FROM user_profiles p
        JOIN users u ON u.id = p.user_id
        ORDER BY u.username
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to list profiles")?;

    Ok(rows
        .iter()
        .map(|r| ProfileWithUser::new(r.get("username"), row_to_profile_sqlite(r)))
        .collect())
}

fn row_to_profile_sqlite(row: &sqlx::sqlite::SqliteRow) -> UserProfile {
    UserProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        website: row.get("website"),
        picture: row.get("picture"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_profile_mysql(pool: &MySqlPool, profile: &UserProfile) -> Result<UserProfile> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO user_profiles (user_id, website, picture, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(profile.user_id)
    .bind(&profile.website)
    .bind(&profile.picture)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create profile")?;

    Ok(UserProfile {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..profile.clone()
    })
}

async fn get_profile_by_user_mysql(pool: &MySqlPool, user_id: i64) -> Result<Option<UserProfile>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, website, picture, created_at, updated_at
        FROM user_profiles WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get profile")?;

    Ok(row.map(|r| row_to_profile_mysql(&r)))
}

async fn list_profiles_mysql(pool: &MySqlPool) -> Result<Vec<ProfileWithUser>> {
    let rows = sqlx::query(
        r#"
        SELECT p.id, p.user_id, p.website, p.picture, p.created_at, p.updated_at, u.username
        FROM user_profiles p
        JOIN users u ON u.id = p.user_id
        ORDER BY u.username
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to list profiles")?;

    Ok(rows
        .iter()
        .map(|r| ProfileWithUser::new(r.get("username"), row_to_profile_mysql(r)))
        .collect())
}

fn row_to_profile_mysql(row: &sqlx::mysql::MySqlRow) -> UserProfile {
    UserProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        website: row.get("website"),
        picture: row.get("picture"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::User;

    async fn setup() -> (SqlxProfileRepository, SqlxUserRepository) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        (
            SqlxProfileRepository::new(pool.clone()),
            SqlxUserRepository::new(pool),
        )
    }

    #[tokio::test]
    async fn test_create_update_list() {
        let (repo, users) = setup().await;
        let bob = users
            .create(&User::new("bob".into(), "bob@example.com".into(), "h".into()))
            .await
            .unwrap();
        let amy = users
            .create(&User::new("amy".into(), "amy@example.com".into(), "h".into()))
            .await
            .unwrap();

        let mut profile = UserProfile::empty(bob.id);
        profile.website = "http://bob.example".into();
        let created = repo.create(&profile).await.unwrap();
        assert!(created.id > 0);
        repo.create(&UserProfile::empty(amy.id)).await.unwrap();

        let mut loaded = repo.get_by_user_id(bob.id).await.unwrap().unwrap();
        loaded.picture = "profile_images/bob.png".into();
        repo.update(&loaded).await.unwrap();

        let listed = repo.list().await.unwrap();
        let names: Vec<_> = listed.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["amy", "bob"]);
        assert_eq!(
            listed[1].picture_url.as_deref(),
            Some("/media/profile_images/bob.png")
        );
    }

    #[tokio::test]
    async fn test_one_profile_per_user() {
        let (repo, users) = setup().await;
        let user = users
            .create(&User::new("solo".into(), "solo@example.com".into(), "h".into()))
            .await
            .unwrap();

        repo.create(&UserProfile::empty(user.id)).await.unwrap();
        assert!(repo.create(&UserProfile::empty(user.id)).await.is_err());
        assert!(repo.get_by_user_id(user.id + 1).await.unwrap().is_none());
    }
}
