//! Page model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PAGE_TITLE_MAX_LEN: usize = 128;
pub const PAGE_URL_MAX_LEN: usize = 200;

/// A link stored under a category, with a click-through counter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    pub id: i64,
    pub category_id: i64,
    pub title: String,
    pub url: String,
    pub views: i64,
    pub created_at: DateTime<Utc>,
}

impl Page {
    pub fn new(category_id: i64, title: String, url: String) -> Self {
        Self {
            id: 0,
            category_id,
            title,
            url,
            views: 0,
            created_at: Utc::now(),
        }
    }
}

/// Input for adding a page to a category
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePageInput {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub views: Option<i64>,
}

impl CreatePageInput {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            views: None,
        }
    }

    pub fn with_views(mut self, views: i64) -> Self {
        self.views = Some(views);
        self
    }
}

/// Input for updating a page; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct UpdatePageInput {
    pub category_id: Option<i64>,
    pub title: Option<String>,
    pub url: Option<String>,
}
