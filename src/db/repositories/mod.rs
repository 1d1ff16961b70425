//! Database repositories
//!
//! One repository per entity, each a trait plus an SQLx implementation
//! that dispatches on the configured backend.

pub mod category;
pub mod page;
pub mod profile;
pub mod session;
pub mod user;
pub mod visitor;

pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use page::{PageRepository, SqlxPageRepository};
pub use profile::{ProfileRepository, SqlxProfileRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use visitor::{SqlxVisitorSessionRepository, VisitorSessionRepository};
