//! Login session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a login session stays valid
pub const SESSION_LIFETIME_DAYS: i64 = 7;

/// Session entity for user authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session token, sent back as the `session` cookie
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session for `user_id` with a random token
    pub fn new(user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(SESSION_LIFETIME_DAYS),
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Remaining lifetime in whole seconds, for the cookie's Max-Age
    pub fn max_age_seconds(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_expires_in_a_week() {
        let session = Session::new(3);
        assert_eq!(session.user_id, 3);
        assert!(!session.is_expired());
        let max_age = session.max_age_seconds();
        assert!(max_age > 7 * 86400 - 5 && max_age <= 7 * 86400);
    }

    #[test]
    fn test_expired_session() {
        let mut session = Session::new(1);
        session.expires_at = Utc::now() - Duration::seconds(1);
        assert!(session.is_expired());
        assert_eq!(session.max_age_seconds(), 0);
    }
}
