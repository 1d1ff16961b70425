//! User service
//!
//! Account registration, password login and the server-side login sessions
//! behind the `session` cookie.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{LoginInput, RegisterInput, Session, User};
use crate::services::is_unique_violation;
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Minimum password length
pub const PASSWORD_MIN_LEN: usize = 8;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.@+-]{3,150}$").expect("username pattern is valid")
});

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
        }
    }

    /// Create an account.
    ///
    /// # Errors
    /// - `ValidationError` for a malformed username or email, a short
    ///   password, or mismatched passwords
    /// - `UserExists` if the username or email is taken
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();
        validate_register_input(&username, &email, &input.password1, &input.password2)?;

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "A user with username '{}' already exists",
                username
            )));
        }

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let password_hash = hash_password(&input.password1)?;
        let user = User::new(username.clone(), email, password_hash);

        let created = self.user_repo.create(&user).await.map_err(|e| {
            if is_unique_violation(&e) {
                UserServiceError::UserExists(username.clone())
            } else {
                UserServiceError::InternalError(e.context("Failed to create user"))
            }
        })?;

        tracing::info!(user_id = created.id, username = %created.username, "User registered");
        Ok(created)
    }

    /// Check credentials and open a session
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let invalid =
            || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .user_repo
            .get_by_username(input.username.trim())
            .await
            .context("Failed to get user by username")?
            .ok_or_else(invalid)?;

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::debug!(username = %user.username, "Rejected login");
            return Err(invalid());
        }

        self.start_session(user.id).await
    }

    /// Open a session for an already authenticated user
    pub async fn start_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let session = Session::new(user_id);
        Ok(self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?)
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Unknown and expired tokens yield `None`; expired sessions are removed.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        Ok(self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await.context("Failed to get user by ID")?)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?)
    }

    /// Delete expired login sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired(Utc::now())
            .await
            .context("Failed to delete expired sessions")?)
    }
}

fn validate_register_input(
    username: &str,
    email: &str,
    password1: &str,
    password2: &str,
) -> Result<(), UserServiceError> {
    if !USERNAME_RE.is_match(username) {
        return Err(UserServiceError::ValidationError(
            "Username must be 3 to 150 characters: letters, digits and @/./+/-/_ only".to_string(),
        ));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(UserServiceError::ValidationError(
            "Enter a valid email address".to_string(),
        ));
    }
    if password1.chars().count() < PASSWORD_MIN_LEN {
        return Err(UserServiceError::ValidationError(format!(
            "Password must contain at least {} characters",
            PASSWORD_MIN_LEN
        )));
    }
    if password1 != password2 {
        return Err(UserServiceError::ValidationError(
            "The two password fields didn't match".to_string(),
        ));
    }
    Ok(())
}
