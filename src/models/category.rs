//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a category name
pub const CATEGORY_NAME_MAX_LEN: usize = 128;

/// A grouping of pages in the link directory.
///
/// `slug` is derived from `name` every time the name changes and is what
/// category URLs are built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub views: i64,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
}

impl Category {
    /// A not-yet-persisted category; the database assigns `id`.
    pub fn new(name: String, slug: String) -> Self {
        Self {
            id: 0,
            name,
            slug,
            views: 0,
            likes: 0,
            created_at: Utc::now(),
        }
    }
}

/// Input for creating a new category
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    #[serde(default)]
    pub views: Option<i64>,
    #[serde(default)]
    pub likes: Option<i64>,
}

impl CreateCategoryInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            views: None,
            likes: None,
        }
    }

    /// Seed counters, used when importing an existing catalogue
    pub fn with_counters(mut self, views: i64, likes: i64) -> Self {
        self.views = Some(views);
        self.likes = Some(likes);
        self
    }
}

/// Input for updating a category; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    #[serde(default)]
    pub name: Option<String>,
}

impl UpdateCategoryInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
