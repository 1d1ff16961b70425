//! User profile model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const WEBSITE_MAX_LEN: usize = 200;

/// Optional extra details attached one-to-one to a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub user_id: i64,
    /// Personal website, empty when not given
    pub website: String,
    /// Picture path relative to the media root, empty when not given
    pub picture: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn empty(user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            user_id,
            website: String::new(),
            picture: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Public URL of the picture, if one was uploaded
    pub fn picture_url(&self) -> Option<String> {
        if self.picture.is_empty() {
            None
        } else {
            Some(format!("/media/{}", self.picture))
        }
    }
}

/// A profile joined with the owning account's username
#[derive(Debug, Clone, Serialize)]
pub struct ProfileWithUser {
    pub username: String,
    #[serde(flatten)]
    pub profile: UserProfile,
    pub picture_url: Option<String>,
}

impl ProfileWithUser {
    pub fn new(username: String, profile: UserProfile) -> Self {
        let picture_url = profile.picture_url();
        Self {
            username,
            profile,
            picture_url,
        }
    }
}

/// Profile form data. `picture` is the stored media path of an upload;
/// `None` keeps the current picture.
#[derive(Debug, Clone, Default)]
pub struct ProfileInput {
    pub website: Option<String>,
    pub picture: Option<String>,
}

impl ProfileInput {
    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn with_picture(mut self, picture: impl Into<String>) -> Self {
        self.picture = Some(picture.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picture_url() {
        let mut profile = UserProfile::empty(1);
        assert_eq!(profile.picture_url(), None);

        profile.picture = "profile_images/abc.png".to_string();
        assert_eq!(
            profile.picture_url().as_deref(),
            Some("/media/profile_images/abc.png")
        );
    }
}
