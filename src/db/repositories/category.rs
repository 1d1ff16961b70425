//! Category repository
//!
//! - `CategoryRepository` trait defining category data access
//! - `SqlxCategoryRepository` implementing it for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::Category;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, category: &Category) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// All categories in creation order
    async fn list(&self) -> Result<Vec<Category>>;

    /// Categories ordered by likes (most liked first), optionally capped
    async fn list_by_likes(&self, limit: Option<i64>) -> Result<Vec<Category>>;

    /// Categories whose name starts with `prefix`, ignoring case
    async fn list_by_name_prefix(&self, prefix: &str, limit: i64) -> Result<Vec<Category>>;

    /// Persist name and slug changes
    async fn update(&self, category: &Category) -> Result<Category>;

    /// Add one like and return the new total, or `None` for an unknown id
    async fn increment_likes(&self, id: i64) -> Result<Option<i64>>;

    /// Delete a category; its pages go with it
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Whether another category already uses this slug
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
}

/// SQLx-based category repository
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_category_sqlite(p, category).await,
            Backend::Mysql(p) => create_category_mysql(p, category).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_category_by_id_sqlite(p, id).await,
            Backend::Mysql(p) => get_category_by_id_mysql(p, id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_category_by_slug_sqlite(p, slug).await,
            Backend::Mysql(p) => get_category_by_slug_mysql(p, slug).await,
        }
    }

    async fn list(&self) -> Result<Vec<Category>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_categories_sqlite(p).await,
            Backend::Mysql(p) => list_categories_mysql(p).await,
        }
    }

    async fn list_by_likes(&self, limit: Option<i64>) -> Result<Vec<Category>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_by_likes_sqlite(p, limit).await,
            Backend::Mysql(p) => list_by_likes_mysql(p, limit).await,
        }
    }

    async fn list_by_name_prefix(&self, prefix: &str, limit: i64) -> Result<Vec<Category>> {
        let pattern = format!("{}%", escape_like(&prefix.to_lowercase()));
        match self.pool.backend() {
            Backend::Sqlite(p) => list_by_name_prefix_sqlite(p, &pattern, limit).await,
            Backend::Mysql(p) => list_by_name_prefix_mysql(p, &pattern, limit).await,
        }
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        match self.pool.backend() {
            Backend::Sqlite(p) => update_category_sqlite(p, category).await,
            Backend::Mysql(p) => update_category_mysql(p, category).await,
        }
    }

    async fn increment_likes(&self, id: i64) -> Result<Option<i64>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => increment_likes_sqlite(p, id).await,
            Backend::Mysql(p) => increment_likes_mysql(p, id).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query("DELETE FROM categories WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete category")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query("DELETE FROM categories WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete category")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let exclude_id = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(p) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE slug = ? AND id != ?")
                    .bind(slug)
                    .bind(exclude_id)
                    .fetch_one(p)
                    .await
                    .context("Failed to check category slug")?
            }
            Backend::Mysql(p) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE slug = ? AND id != ?")
                    .bind(slug)
                    .bind(exclude_id)
                    .fetch_one(p)
                    .await
                    .context("Failed to check category slug")?
            }
        };
        Ok(count > 0)
    }
}

/// Escape LIKE wildcards so user input only matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_category_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO categories (name, slug, views, likes, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&category.name)
    .bind(&category.slug)
    .bind(category.views)
    .bind(category.likes)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_rowid(),
        created_at: now,
        ..category.clone()
    })
}

async fn get_category_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query(
        "SELECT id, name, slug, views, likes, created_at FROM categories WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get category by ID")?;

    Ok(row.map(|r| row_to_category_sqlite(&r)))
}

async fn get_category_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> Result<Option<Category>> {
    let row = sqlx::query(
        "SELECT id, name, slug, views, likes, created_at FROM categories WHERE slug = ?",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("Failed to get category by slug")?;

    Ok(row.map(|r| row_to_category_sqlite(&r)))
}

async fn list_categories_sqlite(pool: &SqlitePool) -> Result<Vec<Category>> {
    let rows = sqlx::query(
        "SELECT id, name, slug, views, likes, created_at FROM categories ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list categories")?;

    Ok(rows.iter().map(row_to_category_sqlite).collect())
}

async fn list_by_likes_sqlite(pool: &SqlitePool, limit: Option<i64>) -> Result<Vec<Category>> {
    let rows = match limit {
        Some(limit) => sqlx::query(
            r#"
            SELECT id, name, slug, views, likes, created_at FROM categories
            ORDER BY likes DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await,
        None => sqlx::query(
            r#"
            SELECT id, name, slug, views, likes, created_at FROM categories
            ORDER BY likes DESC, id ASC
            "#,
        )
        .fetch_all(pool)
        .await,
    }
    .context("Failed to list categories by likes")?;

    Ok(rows.iter().map(row_to_category_sqlite).collect())
}

async fn list_by_name_prefix_sqlite(
    pool: &SqlitePool,
    pattern: &str,
    limit: i64,
) -> Result<Vec<Category>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, slug, views, likes, created_at FROM categories
        WHERE LOWER(name) LIKE ? ESCAPE '\'
        ORDER BY name
        LIMIT ?
        "#,
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to search categories by name")?;

    Ok(rows.iter().map(row_to_category_sqlite).collect())
}

async fn update_category_sqlite(pool: &SqlitePool, category: &Category) -> Result<Category> {
    sqlx::query("UPDATE categories SET name = ?, slug = ? WHERE id = ?")
        .bind(&category.name)
        .bind(&category.slug)
        .bind(category.id)
        .execute(pool)
        .await
        .context("Failed to update category")?;

    get_category_by_id_sqlite(pool, category.id)
        .await?
        .context("Category not found after update")
}

async fn increment_likes_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<i64>> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query("UPDATE categories SET likes = likes + 1 WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment category likes")?;

    if updated.rows_affected() == 0 {
        return Ok(None);
    }

    let total: i64 = sqlx::query_scalar("SELECT likes FROM categories WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Some(total))
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        views: row.get("views"),
        likes: row.get("likes"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_category_mysql(pool: &MySqlPool, category: &Category) -> Result<Category> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO categories (name, slug, views, likes, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&category.name)
    .bind(&category.slug)
    .bind(category.views)
    .bind(category.likes)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create category")?;

    Ok(Category {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..category.clone()
    })
}

async fn get_category_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Category>> {
    let row = sqlx::query(
        "SELECT id, name, slug, views, likes, created_at FROM categories WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get category by ID")?;

    Ok(row.map(|r| row_to_category_mysql(&r)))
}

async fn get_category_by_slug_mysql(pool: &MySqlPool, slug: &str) -> Result<Option<Category>> {
    let row = sqlx::query(
        "SELECT id, name, slug, views, likes, created_at FROM categories WHERE slug = ?",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await
    .context("Failed to get category by slug")?;

    Ok(row.map(|r| row_to_category_mysql(&r)))
}

async fn list_categories_mysql(pool: &MySqlPool) -> Result<Vec<Category>> {
    let rows = sqlx::query(
        "SELECT id, name, slug, views, likes, created_at FROM categories ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list categories")?;

    Ok(rows.iter().map(row_to_category_mysql).collect())
}

async fn list_by_likes_mysql(pool: &MySqlPool, limit: Option<i64>) -> Result<Vec<Category>> {
    let rows = match limit {
        Some(limit) => sqlx::query(
            r#"
            SELECT id, name, slug, views, likes, created_at FROM categories
            ORDER BY likes DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await,
        None => sqlx::query(
            r#"
            SELECT id, name, slug, views, likes, created_at FROM categories
            ORDER BY likes DESC, id ASC
            "#,
        )
        .fetch_all(pool)
        .await,
    }
    .context("Failed to list categories by likes")?;

    Ok(rows.iter().map(row_to_category_mysql).collect())
}

// MySQL escapes LIKE patterns with a backslash by default.
async fn list_by_name_prefix_mysql(
    pool: &MySqlPool,
    pattern: &str,
    limit: i64,
) -> Result<Vec<Category>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, slug, views, likes, created_at FROM categories
        WHERE LOWER(name) LIKE ?
        ORDER BY name
        LIMIT ?
        "#,
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to search categories by name")?;

    Ok(rows.iter().map(row_to_category_mysql).collect())
}

async fn update_category_mysql(pool: &MySqlPool, category: &Category) -> Result<Category> {
    sqlx::query("UPDATE categories SET name = ?, slug = ? WHERE id = ?")
        .bind(&category.name)
        .bind(&category.slug)
        .bind(category.id)
        .execute(pool)
        .await
        .context("Failed to update category")?;

    get_category_by_id_mysql(pool, category.id)
        .await?
        .context("Category not found after update")
}

async fn increment_likes_mysql(pool: &MySqlPool, id: i64) -> Result<Option<i64>> {
    let mut tx = pool.begin().await?;

    let total: Option<i64> =
        sqlx::query_scalar("SELECT likes FROM categories WHERE id = ? FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to lock category")?;

    let Some(total) = total else {
        return Ok(None);
    };

    sqlx::query("UPDATE categories SET likes = likes + 1 WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to increment category likes")?;
    tx.commit().await?;

    Ok(Some(total + 1))
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        views: row.get("views"),
        likes: row.get("likes"),
        created_at: row.get("created_at"),
    }
}
