//! Profile service
//!
//! Every account may have one profile with a website and a picture. A
//! profile is created explicitly after sign-up, or lazily the first time it
//! is viewed.

use crate::config::MediaConfig;
use crate::db::repositories::{ProfileRepository, UserRepository};
use crate::models::profile::WEBSITE_MAX_LEN;
use crate::models::{ProfileInput, ProfileWithUser, User, UserProfile};
use crate::services::is_unique_violation;
use anyhow::Context;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

/// Sub-directory of the media root that holds profile pictures
pub const PROFILE_IMAGES_DIR: &str = "profile_images";

#[derive(Debug, thiserror::Error)]
pub enum ProfileServiceError {
    #[error("Profile already exists for user {0}")]
    AlreadyExists(i64),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Only the owner may change this profile")]
    Forbidden,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ProfileService {
    repo: Arc<dyn ProfileRepository>,
    user_repo: Arc<dyn UserRepository>,
    media: MediaConfig,
}

impl ProfileService {
    pub fn new(
        repo: Arc<dyn ProfileRepository>,
        user_repo: Arc<dyn UserRepository>,
        media: MediaConfig,
    ) -> Self {
        Self {
            repo,
            user_repo,
            media,
        }
    }

    pub fn media(&self) -> &MediaConfig {
        &self.media
    }

    /// Create the profile for `user_id`
    pub async fn register_profile(
        &self,
        user_id: i64,
        input: ProfileInput,
    ) -> Result<UserProfile, ProfileServiceError> {
        if self
            .repo
            .get_by_user_id(user_id)
            .await
            .context("Failed to get profile")?
            .is_some()
        {
            return Err(ProfileServiceError::AlreadyExists(user_id));
        }

        let mut profile = UserProfile::empty(user_id);
        apply_input(&mut profile, input)?;

        let created = self.repo.create(&profile).await.map_err(|e| {
            if is_unique_violation(&e) {
                ProfileServiceError::AlreadyExists(user_id)
            } else {
                ProfileServiceError::InternalError(e.context("Failed to create profile"))
            }
        })?;

        tracing::info!(user_id, "Profile registered");
        Ok(created)
    }

    /// The user called `username` and their profile, creating an empty
    /// profile if they have none yet.
    pub async fn get_or_create(
        &self,
        username: &str,
    ) -> Result<(User, UserProfile), ProfileServiceError> {
        let user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| ProfileServiceError::UserNotFound(username.to_string()))?;

        let profile = self.profile_for(user.id).await?;
        Ok((user, profile))
    }

    /// Update the profile of `username` on behalf of `actor_id`.
    ///
    /// Fails with `Forbidden` unless the actor owns the profile.
    pub async fn update(
        &self,
        actor_id: i64,
        username: &str,
        input: ProfileInput,
    ) -> Result<UserProfile, ProfileServiceError> {
        let (user, mut profile) = self.get_or_create(username).await?;
        if user.id != actor_id {
            return Err(ProfileServiceError::Forbidden);
        }

        let previous = profile.picture.clone();
        apply_input(&mut profile, input)?;
        profile.updated_at = Utc::now();

        let updated = self
            .repo
            .update(&profile)
            .await
            .context("Failed to update profile")?;

        if !previous.is_empty() && previous != updated.picture {
            self.remove_picture(&previous).await;
        }
        Ok(updated)
    }

    /// All profiles with their usernames
    pub async fn list(&self) -> Result<Vec<ProfileWithUser>, ProfileServiceError> {
        Ok(self.repo.list().await.context("Failed to list profiles")?)
    }

    /// Store an uploaded picture and return its path relative to the media
    /// root, ready to go into `ProfileInput::picture`.
    pub async fn save_picture(
        &self,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, ProfileServiceError> {
        if !self.media.is_type_allowed(content_type) {
            return Err(ProfileServiceError::ValidationError(format!(
                "Invalid file type: {}. Allowed types: {}",
                content_type,
                self.media.allowed_types.join(", ")
            )));
        }
        if data.len() as u64 > self.media.max_file_size {
            return Err(ProfileServiceError::ValidationError(format!(
                "File too large. Maximum size: {} bytes",
                self.media.max_file_size
            )));
        }

        let dir = self.media.path.join(PROFILE_IMAGES_DIR);
        ensure_dir(&dir).await?;

        let filename = format!(
            "{}.{}",
            Uuid::new_v4().simple(),
            self.media.extension_for(content_type)
        );
        fs::write(dir.join(&filename), data)
            .await
            .with_context(|| format!("Failed to save picture {}", filename))?;

        tracing::debug!(%filename, size = data.len(), "Profile picture saved");
        Ok(format!("{}/{}", PROFILE_IMAGES_DIR, filename))
    }

    /// Delete a stored picture. Paths outside the profile images directory
    /// are ignored and failures are only logged.
    pub async fn remove_picture(&self, picture: &str) {
        let inside = picture
            .strip_prefix(PROFILE_IMAGES_DIR)
            .and_then(|rest| rest.strip_prefix('/'))
            .is_some_and(|name| !name.is_empty() && !name.contains('/') && !name.contains(".."));
        if !inside {
            return;
        }

        let path = self.media.path.join(picture);
        match fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Profile picture removed"),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Failed to remove profile picture")
            }
        }
    }

    async fn profile_for(&self, user_id: i64) -> Result<UserProfile, ProfileServiceError> {
        if let Some(profile) = self
            .repo
            .get_by_user_id(user_id)
            .await
            .context("Failed to get profile")?
        {
            return Ok(profile);
        }

        match self.repo.create(&UserProfile::empty(user_id)).await {
            Ok(profile) => Ok(profile),
            // Lost a race with a concurrent first view.
            Err(e) if is_unique_violation(&e) => self
                .repo
                .get_by_user_id(user_id)
                .await
                .context("Failed to get profile")?
                .ok_or_else(|| ProfileServiceError::InternalError(e)),
            Err(e) => Err(ProfileServiceError::InternalError(
                e.context("Failed to create profile"),
            )),
        }
    }
}

fn apply_input(profile: &mut UserProfile, input: ProfileInput) -> Result<(), ProfileServiceError> {
    if let Some(website) = input.website {
        profile.website = validate_website(&website)?;
    }
    if let Some(picture) = input.picture {
        profile.picture = picture;
    }
    Ok(())
}

/// Empty is allowed; anything else must be an http(s) URL
pub fn validate_website(website: &str) -> Result<String, ProfileServiceError> {
    let website = website.trim();
    if website.is_empty() {
        return Ok(String::new());
    }

    let lower = website.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("http://")
        .or_else(|| lower.strip_prefix("https://"));
    match rest {
        Some(host) if !host.is_empty() && !host.contains(char::is_whitespace) => {}
        _ => {
            return Err(ProfileServiceError::ValidationError(
                "Enter a valid URL".to_string(),
            ))
        }
    }

    if website.chars().count() > WEBSITE_MAX_LEN {
        return Err(ProfileServiceError::ValidationError(format!(
            "Website must be at most {} characters",
            WEBSITE_MAX_LEN
        )));
    }
    Ok(website.to_string())
}

async fn ensure_dir(path: &Path) -> Result<(), ProfileServiceError> {
    if !path.exists() {
        fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create media dir {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxProfileRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use tempfile::TempDir;

    async fn setup(media_root: &Path) -> (ProfileService, Arc<dyn UserRepository>) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let users = SqlxUserRepository::boxed(pool.clone());
        let media = MediaConfig {
            path: media_root.to_path_buf(),
            max_file_size: 16,
            ..Default::default()
        };
        (
            ProfileService::new(SqlxProfileRepository::boxed(pool), users.clone(), media),
            users,
        )
    }

    async fn add_user(users: &Arc<dyn UserRepository>, username: &str) -> User {
        users
            .create(&User::new(
                username.to_string(),
                format!("{}@example.com", username),
                "hash".to_string(),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_profile_once() {
        let dir = TempDir::new().unwrap();
        let (service, users) = setup(dir.path()).await;
        let user = add_user(&users, "leifos").await;

        let profile = service
            .register_profile(
                user.id,
                ProfileInput::default().with_website("http://www.tangowithdjango.com"),
            )
            .await
            .unwrap();
        assert_eq!(profile.website, "http://www.tangowithdjango.com");
        assert_eq!(profile.picture, "");

        let again = service.register_profile(user.id, ProfileInput::default()).await;
        assert!(matches!(again, Err(ProfileServiceError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_get_or_create() {
        let dir = TempDir::new().unwrap();
        let (service, users) = setup(dir.path()).await;
        let user = add_user(&users, "jill").await;

        let (found, profile) = service.get_or_create("jill").await.unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(profile.user_id, user.id);

        let (_, same) = service.get_or_create("jill").await.unwrap();
        assert_eq!(same.id, profile.id);

        assert!(matches!(
            service.get_or_create("nobody").await,
            Err(ProfileServiceError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_only_owner_updates() {
        let dir = TempDir::new().unwrap();
        let (service, users) = setup(dir.path()).await;
        let owner = add_user(&users, "owner").await;
        let other = add_user(&users, "other").await;

        let updated = service
            .update(
                owner.id,
                "owner",
                ProfileInput::default()
                    .with_website("https://example.com")
                    .with_picture("profile_images/a.png"),
            )
            .await
            .unwrap();
        assert_eq!(updated.website, "https://example.com");
        assert_eq!(updated.picture_url().as_deref(), Some("/media/profile_images/a.png"));

        let denied = service
            .update(other.id, "owner", ProfileInput::default().with_website(""))
            .await;
        assert!(matches!(denied, Err(ProfileServiceError::Forbidden)));
    }

    #[tokio::test]
    async fn test_website_validation() {
        let dir = TempDir::new().unwrap();
        let (service, users) = setup(dir.path()).await;
        let user = add_user(&users, "val").await;

        for bad in ["ftp://example.com", "example.com", "http://", "http://a b"] {
            let result = service
                .register_profile(user.id, ProfileInput::default().with_website(bad))
                .await;
            assert!(
                matches!(result, Err(ProfileServiceError::ValidationError(_))),
                "{} should be rejected",
                bad
            );
        }

        let long = format!("http://{}.com", "a".repeat(200));
        let result = service
            .register_profile(user.id, ProfileInput::default().with_website(long))
            .await;
        assert!(matches!(result, Err(ProfileServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_list_includes_usernames() {
        let dir = TempDir::new().unwrap();
        let (service, users) = setup(dir.path()).await;
        let b = add_user(&users, "bob").await;
        let a = add_user(&users, "alice").await;
        service.register_profile(b.id, ProfileInput::default()).await.unwrap();
        service.register_profile(a.id, ProfileInput::default()).await.unwrap();

        let names: Vec<String> = service
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.username)
            .collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_replaced_picture_is_removed() {
        let dir = TempDir::new().unwrap();
        let (service, users) = setup(dir.path()).await;
        let owner = add_user(&users, "pic").await;

        let first = service.save_picture("image/png", b"first").await.unwrap();
        service
            .update(owner.id, "pic", ProfileInput::default().with_picture(first.clone()))
            .await
            .unwrap();
        assert!(dir.path().join(&first).exists());

        let second = service.save_picture("image/png", b"second").await.unwrap();
        let updated = service
            .update(owner.id, "pic", ProfileInput::default().with_picture(second.clone()))
            .await
            .unwrap();
        assert_eq!(updated.picture, second);
        assert!(!dir.path().join(&first).exists());
        assert!(dir.path().join(&second).exists());

        // Website-only updates keep the picture.
        service
            .update(owner.id, "pic", ProfileInput::default().with_website(""))
            .await
            .unwrap();
        assert!(dir.path().join(&second).exists());
    }

    #[tokio::test]
    async fn test_remove_picture_stays_in_media_dir() {
        let dir = TempDir::new().unwrap();
        let (service, _) = setup(dir.path()).await;
        std::fs::write(dir.path().join("keep.txt"), b"keep").unwrap();

        service.remove_picture("../keep.txt").await;
        service.remove_picture("profile_images/../keep.txt").await;
        service.remove_picture("keep.txt").await;
        assert!(dir.path().join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_save_picture() {
        let dir = TempDir::new().unwrap();
        let (service, _) = setup(dir.path()).await;

        let path = service.save_picture("image/png", b"\x89PNG....").await.unwrap();
        assert!(path.starts_with("profile_images/"));
        assert!(path.ends_with(".png"));
        assert_eq!(
            std::fs::read(dir.path().join(&path)).unwrap(),
            b"\x89PNG....".to_vec()
        );

        let wrong_type = service.save_picture("text/plain", b"hello").await;
        assert!(matches!(wrong_type, Err(ProfileServiceError::ValidationError(_))));

        let too_big = service.save_picture("image/png", &[0u8; 17]).await;
        assert!(matches!(too_big, Err(ProfileServiceError::ValidationError(_))));
    }
}
