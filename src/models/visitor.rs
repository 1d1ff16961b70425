//! Anonymous visitor session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long an idle visitor session is kept
pub const VISITOR_SESSION_LIFETIME_DAYS: i64 = 14;

/// Server-side state behind the `sessionid` cookie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitorSession {
    pub key: String,
    pub visits: i64,
    pub last_visit: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VisitorSession {
    /// A first visit happening at `now`
    pub fn start(now: DateTime<Utc>) -> Self {
        Self {
            key: uuid::Uuid::new_v4().simple().to_string(),
            visits: 1,
            last_visit: now,
            expires_at: now + Duration::days(VISITOR_SESSION_LIFETIME_DAYS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
