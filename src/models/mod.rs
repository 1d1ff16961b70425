//! Data models
//!
//! Database entities for the link directory (categories and pages), user
//! accounts with their login sessions and profiles, and the anonymous
//! visitor sessions used for visit counting.

pub mod category;
pub mod page;
pub mod profile;
pub mod session;
pub mod user;
pub mod visitor;

pub use category::{Category, CreateCategoryInput, UpdateCategoryInput};
pub use page::{CreatePageInput, Page, UpdatePageInput};
pub use profile::{ProfileInput, ProfileWithUser, UserProfile};
pub use session::Session;
pub use user::{LoginInput, RegisterInput, User};
pub use visitor::VisitorSession;
