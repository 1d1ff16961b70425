//! Services layer - business logic
//!
//! Services validate input, coordinate repositories and the cache, and
//! translate storage failures into typed errors for the HTTP layer.

pub mod category;
pub mod page;
pub mod password;
pub mod profile;
pub mod search;
pub mod user;
pub mod visitor;

pub use category::{generate_slug, CategoryService, CategoryServiceError};
pub use page::{normalize_url, PageService, PageServiceError};
pub use password::{hash_password, verify_password};
pub use profile::{validate_website, ProfileService, ProfileServiceError};
pub use search::{BingSearch, SearchError, SearchProvider, SearchResult, SearchService};
pub use user::{UserService, UserServiceError};
pub use visitor::{next_visit, VisitorService};

/// Whether a repository error was caused by a unique constraint violation
pub(crate) fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .map(|db| db.is_unique_violation())
            .unwrap_or(false)
    })
}
