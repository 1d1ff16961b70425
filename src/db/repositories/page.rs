//! Page repository
//!
//! Pages are the links filed under a category.

use crate::db::{Backend, DynDatabasePool};
use crate::models::Page;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Page repository trait
#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn create(&self, page: &Page) -> Result<Page>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Page>>;

    /// Pages of one category, most viewed first
    async fn list_by_category(&self, category_id: i64) -> Result<Vec<Page>>;

    /// Pages ordered by views (most viewed first), optionally capped
    async fn list_by_views(&self, limit: Option<i64>) -> Result<Vec<Page>>;

    async fn update(&self, page: &Page) -> Result<Page>;

    /// Record one click-through and return the updated page
    async fn increment_views(&self, id: i64) -> Result<Option<Page>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based page repository
pub struct SqlxPageRepository {
    pool: DynDatabasePool,
}

impl SqlxPageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PageRepository for SqlxPageRepository {
    async fn create(&self, page: &Page) -> Result<Page> {
        match self.pool.backend() {
            Backend::Sqlite(p) => create_page_sqlite(p, page).await,
            Backend::Mysql(p) => create_page_mysql(p, page).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Page>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => get_page_by_id_sqlite(p, id).await,
            Backend::Mysql(p) => get_page_by_id_mysql(p, id).await,
        }
    }

    async fn list_by_category(&self, category_id: i64) -> Result<Vec<Page>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_pages_by_category_sqlite(p, category_id).await,
            Backend::Mysql(p) => list_pages_by_category_mysql(p, category_id).await,
        }
    }

    async fn list_by_views(&self, limit: Option<i64>) -> Result<Vec<Page>> {
        match self.pool.backend() {
            Backend::Sqlite(p) => list_pages_by_views_sqlite(p, limit).await,
            Backend::Mysql(p) => list_pages_by_views_mysql(p, limit).await,
        }
    }

    async fn update(&self, page: &Page) -> Result<Page> {
        match self.pool.backend() {
            Backend::Sqlite(p) => update_page_sqlite(p, page).await,
            Backend::Mysql(p) => update_page_mysql(p, page).await,
        }
    }

    async fn increment_views(&self, id: i64) -> Result<Option<Page>> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query("UPDATE pages SET views = views + 1 WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to increment page views")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query("UPDATE pages SET views = views + 1 WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to increment page views")?
                .rows_affected(),
        };
        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(p) => sqlx::query("DELETE FROM pages WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete page")?
                .rows_affected(),
            Backend::Mysql(p) => sqlx::query("DELETE FROM pages WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete page")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_page_sqlite(pool: &SqlitePool, page: &Page) -> Result<Page> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO pages (category_id, title, url, views, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(page.category_id)
    .bind(&page.title)
    .bind(&page.url)
    .bind(page.views)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create page")?;

    Ok(Page {
        id: result.last_insert_rowid(),
        created_at: now,
        ..page.clone()
    })
}

async fn get_page_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Page>> {
    let row = sqlx::query(
        "SELECT id, category_id, title, url, views, created_at FROM pages WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get page by ID")?;

    Ok(row.map(|r| row_to_page_sqlite(&r)))
}

async fn list_pages_by_category_sqlite(pool: &SqlitePool, category_id: i64) -> Result<Vec<Page>> {
    let rows = sqlx::query(
        r#"
        SELECT id, category_id, title, url, views, created_at FROM pages
        WHERE category_id = ?
        ORDER BY views DESC, id ASC
        "#,
    )
    .bind(category_id)
    .fetch_all(pool)
    .await
    .context("Failed to list pages for category")?;

    Ok(rows.iter().map(row_to_page_sqlite).collect())
}

async fn list_pages_by_views_sqlite(pool: &SqlitePool, limit: Option<i64>) -> Result<Vec<Page>> {
    let rows = match limit {
        Some(limit) => sqlx::query(
            r#"
            SELECT id, category_id, title, url, views, created_at FROM pages
            ORDER BY views DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await,
        None => sqlx::query(
            r#"
            SELECT id, category_id, title, url, views, created_at FROM pages
            ORDER BY views DESC, id ASC
            "#,
        )
        .fetch_all(pool)
        .await,
    }
    .context("Failed to list pages by views")?;

    Ok(rows.iter().map(row_to_page_sqlite).collect())
}

async fn update_page_sqlite(pool: &SqlitePool, page: &Page) -> Result<Page> {
    sqlx::query("UPDATE pages SET category_id = ?, title = ?, url = ? WHERE id = ?")
        .bind(page.category_id)
        .bind(&page.title)
        .bind(&page.url)
        .bind(page.id)
        .execute(pool)
        .await
        .context("Failed to update page")?;

    get_page_by_id_sqlite(pool, page.id)
        .await?
        .context("Page not found after update")
}

fn row_to_page_sqlite(row: &sqlx::sqlite::SqliteRow) -> Page {
    Page {
        id: row.get("id"),
        category_id: row.get("category_id"),
        title: row.get("title"),
        url: row.get("url"),
        views: row.get("views"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_page_mysql(pool: &MySqlPool, page: &Page) -> Result<Page> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO pages (category_id, title, url, views, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(page.category_id)
    .bind(&page.title)
    .bind(&page.url)
    .bind(page.views)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create page")?;

    Ok(Page {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..page.clone()
    })
}

async fn get_page_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Page>> {
    let row = sqlx::query(
        "SELECT id, category_id, title, url, views, created_at FROM pages WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get page by ID")?;

    Ok(row.map(|r| row_to_page_mysql(&r)))
}

async fn list_pages_by_category_mysql(pool: &MySqlPool, category_id: i64) -> Result<Vec<Page>> {
    let rows = sqlx::query(
        r#"
        SELECT id, category_id, title, url, views, created_at FROM pages
        WHERE category_id = ?
        ORDER BY views DESC, id ASC
        "#,
    )
    .bind(category_id)
    .fetch_all(pool)
    .await
    .context("Failed to list pages for category")?;

    Ok(rows.iter().map(row_to_page_mysql).collect())
}

async fn list_pages_by_views_mysql(pool: &MySqlPool, limit: Option<i64>) -> Result<Vec<Page>> {
    let rows = match limit {
        Some(limit) => sqlx::query(
            r#"
            SELECT id, category_id, title, url, views, created_at FROM pages
            ORDER BY views DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await,
        None => sqlx::query(
            r#"
            SELECT id, category_id, title, url, views, created_at FROM pages
            ORDER BY views DESC, id ASC
            "#,
        )
        .fetch_all(pool)
        .await,
    }
    .context("Failed to list pages by views")?;

    Ok(rows.iter().map(row_to_page_mysql).collect())
}

async fn update_page_mysql(pool: &MySqlPool, page: &Page) -> Result<Page> {
    sqlx::query("UPDATE pages SET category_id = ?, title = ?, url = ? WHERE id = ?")
        .bind(page.category_id)
        .bind(&page.title)
        .bind(&page.url)
        .bind(page.id)
        .execute(pool)
        .await
        .context("Failed to update page")?;

    get_page_by_id_mysql(pool, page.id)
        .await?
        .context("Page not found after update")
}

fn row_to_page_mysql(row: &sqlx::mysql::MySqlRow) -> Page {
    Page {
        id: row.get("id"),
        category_id: row.get("category_id"),
        title: row.get("title"),
        url: row.get("url"),
        views: row.get("views"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{CategoryRepository, SqlxCategoryRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::Category;

    async fn setup() -> (SqlxPageRepository, SqlxCategoryRepository, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let categories = SqlxCategoryRepository::new(pool.clone());
        let category = categories
            .create(&Category::new("Python".into(), "python".into()))
            .await
            .unwrap();
        (SqlxPageRepository::new(pool), categories, category.id)
    }

    fn page(category_id: i64, title: &str, views: i64) -> Page {
        let mut p = Page::new(category_id, title.to_string(), format!("http://{}.example", title));
        p.views = views;
        p
    }

    #[tokio::test]
    async fn test_create_and_list_by_category() {
        let (repo, categories, python) = setup().await;
        let django = categories
            .create(&Category::new("Django".into(), "django".into()))
            .await
            .unwrap();

        repo.create(&page(python, "tutorial", 3)).await.unwrap();
        repo.create(&page(python, "docs", 10)).await.unwrap();
        repo.create(&page(django.id, "django-docs", 1)).await.unwrap();

        let pages = repo.list_by_category(python).await.unwrap();
        let titles: Vec<_> = pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["docs", "tutorial"]);
    }

    #[tokio::test]
    async fn test_list_by_views_with_limit() {
        let (repo, _categories, python) = setup().await;
        for (i, views) in [5, 50, 1, 20, 9, 7].iter().enumerate() {
            repo.create(&page(python, &format!("p{}", i), *views)).await.unwrap();
        }

        let top = repo.list_by_views(Some(5)).await.unwrap();
        let views: Vec<_> = top.iter().map(|p| p.views).collect();
        assert_eq!(views, vec![50, 20, 9, 7, 5]);
        assert_eq!(repo.list_by_views(None).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_increment_views() {
        let (repo, _categories, python) = setup().await;
        let created = repo.create(&page(python, "tracked", 0)).await.unwrap();

        let tracked = repo.increment_views(created.id).await.unwrap().unwrap();
        assert_eq!(tracked.views, 1);
        assert_eq!(tracked.url, "http://tracked.example");
        assert!(repo.increment_views(12345).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (repo, _categories, python) = setup().await;
        let mut created = repo.create(&page(python, "before", 0)).await.unwrap();

        created.title = "after".to_string();
        let updated = repo.update(&created).await.unwrap();
        assert_eq!(updated.title, "after");

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_page_requires_existing_category() {
        let (repo, _categories, _python) = setup().await;
        assert!(repo.create(&page(999, "orphan", 0)).await.is_err());
    }
}
