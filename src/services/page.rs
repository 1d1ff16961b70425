//! Page service
//!
//! Pages are links filed under a category. Views are counted when a visitor
//! follows a link through `track_url`.

use crate::db::repositories::{CategoryRepository, PageRepository};
use crate::models::page::{PAGE_TITLE_MAX_LEN, PAGE_URL_MAX_LEN};
use crate::models::{CreatePageInput, Page, UpdatePageInput};
use anyhow::Context;
use std::sync::Arc;

/// Number of pages shown on the index page
pub const TOP_PAGES: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum PageServiceError {
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Page not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PageService {
    repo: Arc<dyn PageRepository>,
    category_repo: Arc<dyn CategoryRepository>,
}

impl PageService {
    pub fn new(repo: Arc<dyn PageRepository>, category_repo: Arc<dyn CategoryRepository>) -> Self {
        Self {
            repo,
            category_repo,
        }
    }

    /// Add a page to the category with the given slug
    ///
    /// The title and url are checked before the category is looked up.
    pub async fn add_to_category(
        &self,
        category_slug: &str,
        input: CreatePageInput,
    ) -> Result<Page, PageServiceError> {
        validate_title(&input.title)?;
        validate_url(&input.url)?;

        let category = self
            .category_repo
            .get_by_slug(category_slug)
            .await
            .context("Failed to get category")?
            .ok_or_else(|| PageServiceError::CategoryNotFound(category_slug.to_string()))?;

        self.create(category.id, input).await
    }

    /// Add a page to the category with the given id
    pub async fn create(
        &self,
        category_id: i64,
        input: CreatePageInput,
    ) -> Result<Page, PageServiceError> {
        self.ensure_category(category_id).await?;

        let title = validate_title(&input.title)?;
        let url = validate_url(&input.url)?;

        let mut page = Page::new(category_id, title, url);
        page.views = input.views.unwrap_or(0).max(0);

        let created = self.repo.create(&page).await.context("Failed to create page")?;
        tracing::info!(id = created.id, category_id, "Page created");
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Page>, PageServiceError> {
        Ok(self.repo.get_by_id(id).await.context("Failed to get page")?)
    }

    /// Pages of a category, most viewed first
    pub async fn list_by_category(&self, category_id: i64) -> Result<Vec<Page>, PageServiceError> {
        Ok(self
            .repo
            .list_by_category(category_id)
            .await
            .context("Failed to list pages")?)
    }

    /// Most viewed pages, for the index page
    pub async fn top_by_views(&self) -> Result<Vec<Page>, PageServiceError> {
        Ok(self
            .repo
            .list_by_views(Some(TOP_PAGES))
            .await
            .context("Failed to list top pages")?)
    }

    /// Every page, most viewed first
    pub async fn list(&self) -> Result<Vec<Page>, PageServiceError> {
        Ok(self
            .repo
            .list_by_views(None)
            .await
            .context("Failed to list pages")?)
    }

    pub async fn update(&self, id: i64, input: UpdatePageInput) -> Result<Page, PageServiceError> {
        let mut page = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get page")?
            .ok_or(PageServiceError::NotFound(id))?;

        if let Some(category_id) = input.category_id {
            self.ensure_category(category_id).await?;
            page.category_id = category_id;
        }
        if let Some(ref title) = input.title {
            page.title = validate_title(title)?;
        }
        if let Some(ref url) = input.url {
            page.url = validate_url(url)?;
        }

        Ok(self.repo.update(&page).await.context("Failed to update page")?)
    }

    pub async fn delete(&self, id: i64) -> Result<(), PageServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete page")? {
            return Err(PageServiceError::NotFound(id));
        }
        Ok(())
    }

    /// Count a click-through and return the url to redirect to.
    ///
    /// `page_id` comes straight from the query string; anything that is not
    /// the id of an existing page yields `None`.
    pub async fn track_url(&self, page_id: &str) -> Result<Option<String>, PageServiceError> {
        let Ok(id) = page_id.trim().parse::<i64>() else {
            return Ok(None);
        };

        let page = self
            .repo
            .increment_views(id)
            .await
            .context("Failed to count page view")?;

        Ok(page.map(|p| p.url))
    }

    async fn ensure_category(&self, category_id: i64) -> Result<(), PageServiceError> {
        if self
            .category_repo
            .get_by_id(category_id)
            .await
            .context("Failed to get category")?
            .is_none()
        {
            return Err(PageServiceError::CategoryNotFound(category_id.to_string()));
        }
        Ok(())
    }
}

/// Prefix `http://` onto urls that carry no http(s) scheme
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    if url.is_empty() || lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

fn validate_title(title: &str) -> Result<String, PageServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PageServiceError::ValidationError("Title is required".to_string()));
    }
    if title.chars().count() > PAGE_TITLE_MAX_LEN {
        return Err(PageServiceError::ValidationError(format!(
            "Title must be at most {} characters",
            PAGE_TITLE_MAX_LEN
        )));
    }
    Ok(title.to_string())
}

fn validate_url(url: &str) -> Result<String, PageServiceError> {
    let url = normalize_url(url);
    if url.is_empty() {
        return Err(PageServiceError::ValidationError("URL is required".to_string()));
    }
    if url.chars().count() > PAGE_URL_MAX_LEN {
        return Err(PageServiceError::ValidationError(format!(
            "URL must be at most {} characters",
            PAGE_URL_MAX_LEN
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCategoryRepository, SqlxPageRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::Category;

    async fn setup() -> (PageService, i64) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        let categories = SqlxCategoryRepository::boxed(pool.clone());
        let python = categories
            .create(&Category::new("Python".to_string(), "python".to_string()))
            .await
            .unwrap();

        (
            PageService::new(SqlxPageRepository::boxed(pool), categories),
            python.id,
        )
    }

    #[tokio::test]
    async fn test_add_to_category_normalizes_url() {
        let (service, category_id) = setup().await;

        let page = service
            .add_to_category("python", CreatePageInput::new(" Docs ", "docs.python.org"))
            .await
            .unwrap();

        assert_eq!(page.category_id, category_id);
        assert_eq!(page.title, "Docs");
        assert_eq!(page.url, "http://docs.python.org");
        assert_eq!(page.views, 0);

        let secure = service
            .add_to_category("python", CreatePageInput::new("Tutorial", "https://docs.python.org/3/"))
            .await
            .unwrap();
        assert_eq!(secure.url, "https://docs.python.org/3/");
    }

    #[tokio::test]
    async fn test_add_to_unknown_category() {
        let (service, _) = setup().await;
        let result = service
            .add_to_category("cobol", CreatePageInput::new("Manual", "http://example.com"))
            .await;
        assert!(matches!(result, Err(PageServiceError::CategoryNotFound(_))));

        let invalid = service
            .add_to_category("cobol", CreatePageInput::new("  ", "http://example.com"))
            .await;
        assert!(matches!(invalid, Err(PageServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_validation() {
        let (service, category_id) = setup().await;

        let no_title = service.create(category_id, CreatePageInput::new("", "http://a.b")).await;
        assert!(matches!(no_title, Err(PageServiceError::ValidationError(_))));

        let no_url = service.create(category_id, CreatePageInput::new("Title", "  ")).await;
        assert!(matches!(no_url, Err(PageServiceError::ValidationError(_))));

        // 194 characters plus the added scheme is one too many.
        let long = format!("{}.com", "a".repeat(190));
        let too_long = service.create(category_id, CreatePageInput::new("Title", long)).await;
        assert!(matches!(too_long, Err(PageServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_track_url() {
        let (service, category_id) = setup().await;
        let page = service
            .create(category_id, CreatePageInput::new("Rust", "https://www.rust-lang.org"))
            .await
            .unwrap();

        let url = service.track_url(&page.id.to_string()).await.unwrap();
        assert_eq!(url.as_deref(), Some("https://www.rust-lang.org"));
        service.track_url(&page.id.to_string()).await.unwrap();

        assert_eq!(service.get_by_id(page.id).await.unwrap().unwrap().views, 2);

        assert!(service.track_url("9999").await.unwrap().is_none());
        assert!(service.track_url("abc").await.unwrap().is_none());
        assert!(service.track_url("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_top_by_views_and_update() {
        let (service, category_id) = setup().await;
        for views in [10, 50, 20, 40, 30, 60] {
            service
                .create(
                    category_id,
                    CreatePageInput::new(format!("Page {}", views), "http://example.com")
                        .with_views(views),
                )
                .await
                .unwrap();
        }

        let top: Vec<i64> = service.top_by_views().await.unwrap().iter().map(|p| p.views).collect();
        assert_eq!(top, vec![60, 50, 40, 30, 20]);
        assert_eq!(service.list().await.unwrap().len(), 6);

        let first = service.list().await.unwrap()[0].clone();
        let updated = service
            .update(
                first.id,
                UpdatePageInput {
                    url: Some("example.org".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.url, "http://example.org");
        assert_eq!(updated.title, first.title);

        let bad_category = service
            .update(
                first.id,
                UpdatePageInput {
                    category_id: Some(999),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(bad_category, Err(PageServiceError::CategoryNotFound(_))));

        service.delete(first.id).await.unwrap();
        assert!(matches!(
            service.delete(first.id).await,
            Err(PageServiceError::NotFound(_))
        ));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalized_urls_have_a_scheme(url in "[a-z0-9./:-]{1,60}") {
                let normalized = normalize_url(&url);
                prop_assert!(
                    normalized.starts_with("http://") || normalized.starts_with("https://")
                );
            }

            #[test]
            fn normalize_is_idempotent(url in "[a-zA-Z0-9./:-]{0,60}") {
                let once = normalize_url(&url);
                prop_assert_eq!(normalize_url(&once), once);
            }
        }
    }
}
