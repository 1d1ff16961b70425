//! Category service
//!
//! - Create, read, rename and delete categories
//! - Slug generation and uniqueness
//! - Like counter
//! - Name-prefix suggestions for the sidebar search box
//!
//! Reads used on every page (the sidebar list and slug lookups) are cached
//! and every write invalidates the `category:*` keys.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::CategoryRepository;
use crate::models::category::CATEGORY_NAME_MAX_LEN;
use crate::models::{Category, CreateCategoryInput, UpdateCategoryInput};
use crate::services::is_unique_violation;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

const CACHE_KEY_CATEGORY_LIST: &str = "category:list";
const CACHE_KEY_CATEGORY_BY_SLUG: &str = "category:slug:";

/// Number of categories shown on the index page
pub const TOP_CATEGORIES: i64 = 5;

/// Maximum number of suggestions returned for a prefix
pub const MAX_SUGGESTIONS: i64 = 8;

#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Category with this name already exists: {0}")]
    DuplicateName(String),

    #[error("Category not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<Cache>) -> Self {
        let cache_ttl = cache.default_ttl();
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    /// Create a new category with zeroed (or seeded) counters.
    ///
    /// # Errors
    /// - `ValidationError` for an empty, overlong or slug-less name
    /// - `DuplicateName` if the name (or one slugging the same way) exists
    pub async fn create(&self, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        let name = validate_name(&input.name)?;
        let slug = slug_for(&name)?;

        if self
            .repo
            .exists_by_slug(&slug, None)
            .await
            .context("Failed to check category uniqueness")?
        {
            return Err(CategoryServiceError::DuplicateName(name));
        }

        let mut category = Category::new(name.clone(), slug);
        category.views = input.views.unwrap_or(0).max(0);
        category.likes = input.likes.unwrap_or(0).max(0);

        let created = self.repo.create(&category).await.map_err(|e| {
            if is_unique_violation(&e) {
                CategoryServiceError::DuplicateName(name.clone())
            } else {
                CategoryServiceError::InternalError(e.context("Failed to create category"))
            }
        })?;

        tracing::info!(id = created.id, slug = %created.slug, "Category created");
        self.invalidate_cache().await;
        Ok(created)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Category>, CategoryServiceError> {
        Ok(self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get category by ID")?)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, CategoryServiceError> {
        let cache_key = format!("{}{}", CACHE_KEY_CATEGORY_BY_SLUG, slug);
        if let Some(category) = self.cache.get::<Category>(&cache_key).await.ok().flatten() {
            return Ok(Some(category));
        }

        let category = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get category by slug")?;

        if let Some(ref c) = category {
            let _ = self.cache.set(&cache_key, c, self.cache_ttl).await;
        }
        Ok(category)
    }

    /// Every category, for the sidebar
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        if let Some(categories) = self
            .cache
            .get::<Vec<Category>>(CACHE_KEY_CATEGORY_LIST)
            .await
            .ok()
            .flatten()
        {
            return Ok(categories);
        }

        let categories = self.repo.list().await.context("Failed to list categories")?;
        let _ = self
            .cache
            .set(CACHE_KEY_CATEGORY_LIST, &categories, self.cache_ttl)
            .await;
        Ok(categories)
    }

    /// Most liked categories, for the index page
    pub async fn top_by_likes(&self) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self
            .repo
            .list_by_likes(Some(TOP_CATEGORIES))
            .await
            .context("Failed to list top categories")?)
    }

    /// Every category, most liked first
    pub async fn list_by_likes(&self) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self
            .repo
            .list_by_likes(None)
            .await
            .context("Failed to list categories")?)
    }

    /// Rename a category; the slug follows the new name.
    pub async fn update(
        &self,
        id: i64,
        input: UpdateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let mut category = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or_else(|| CategoryServiceError::NotFound(id.to_string()))?;

        if let Some(ref name) = input.name {
            let name = validate_name(name)?;
            let slug = slug_for(&name)?;
            if self
                .repo
                .exists_by_slug(&slug, Some(id))
                .await
                .context("Failed to check category uniqueness")?
            {
                return Err(CategoryServiceError::DuplicateName(name));
            }
            category.name = name;
            category.slug = slug;
        }

        let updated = self.repo.update(&category).await.map_err(|e| {
            if is_unique_violation(&e) {
                CategoryServiceError::DuplicateName(category.name.clone())
            } else {
                CategoryServiceError::InternalError(e.context("Failed to update category"))
            }
        })?;

        self.invalidate_cache().await;
        Ok(updated)
    }

    /// Add a like and return the new total
    pub async fn like(&self, id: i64) -> Result<i64, CategoryServiceError> {
        let likes = self
            .repo
            .increment_likes(id)
            .await
            .context("Failed to like category")?
            .ok_or_else(|| CategoryServiceError::NotFound(id.to_string()))?;

        tracing::debug!(id, likes, "Category liked");
        self.invalidate_cache().await;
        Ok(likes)
    }

    /// Up to eight categories whose name starts with `starts_with`, ignoring
    /// case. A blank prefix suggests nothing.
    pub async fn suggest(&self, starts_with: &str) -> Result<Vec<Category>, CategoryServiceError> {
        let prefix = starts_with.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .repo
            .list_by_name_prefix(prefix, MAX_SUGGESTIONS)
            .await
            .context("Failed to suggest categories")?)
    }

    /// Delete a category together with its pages
    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete category")?;
        if !deleted {
            return Err(CategoryServiceError::NotFound(id.to_string()));
        }

        tracing::info!(id, "Category deleted");
        self.invalidate_cache().await;
        Ok(())
    }

    async fn invalidate_cache(&self) {
        let _ = self.cache.delete_pattern("category:*").await;
    }
}

fn validate_name(name: &str) -> Result<String, CategoryServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "Name is required".to_string(),
        ));
    }
    if name.chars().count() > CATEGORY_NAME_MAX_LEN {
        return Err(CategoryServiceError::ValidationError(format!(
            "Name must be at most {} characters",
            CATEGORY_NAME_MAX_LEN
        )));
    }
    Ok(name.to_string())
}

fn slug_for(name: &str) -> Result<String, CategoryServiceError> {
    let slug = generate_slug(name);
    if slug.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "Name must contain at least one letter or digit".to_string(),
        ));
    }
    Ok(slug)
}

/// Generate a URL slug from a name.
///
/// Lowercases, keeps ASCII alphanumerics and non-ASCII letters, turns
/// everything else into `-`, then collapses and trims hyphens.
pub fn generate_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut prev_hyphen = true;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphanumeric()) {
            slug.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen {
            slug.push('-');
            prev_hyphen = true;
        }
    }

    slug.trim_end_matches('-').to_string()
}
