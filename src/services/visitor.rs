//! Visitor tracking
//!
//! Anonymous visitors carry a `sessionid` cookie that names a server-side
//! [`VisitorSession`]. The visit counter goes up at most once per day.

use crate::db::repositories::VisitorSessionRepository;
use crate::models::visitor::VISITOR_SESSION_LIFETIME_DAYS;
use crate::models::VisitorSession;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Advance a visitor session to a visit happening at `now`.
///
/// A missing or expired session starts over at one visit. Otherwise the
/// count goes up when at least a whole day has passed since the last
/// counted visit; within the day nothing changes but the expiry.
pub fn next_visit(previous: Option<VisitorSession>, now: DateTime<Utc>) -> VisitorSession {
    let mut session = match previous {
        Some(session) if !session.is_expired(now) => session,
        _ => return VisitorSession::start(now),
    };

    if (now - session.last_visit).num_days() >= 1 {
        session.visits += 1;
        session.last_visit = now;
    }
    session.expires_at = now + Duration::days(VISITOR_SESSION_LIFETIME_DAYS);
    session
}

pub struct VisitorService {
    repo: Arc<dyn VisitorSessionRepository>,
}

impl VisitorService {
    pub fn new(repo: Arc<dyn VisitorSessionRepository>) -> Self {
        Self { repo }
    }

    /// Record a request from the visitor holding `session_key`.
    ///
    /// Returns the stored session; its key may differ from the one passed in
    /// when the old session was unknown or had expired.
    pub async fn track(
        &self,
        session_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<VisitorSession> {
        let previous = match session_key {
            Some(key) if !key.is_empty() => self
                .repo
                .get(key)
                .await
                .context("Failed to load visitor session")?,
            _ => None,
        };

        let session = next_visit(previous, now);
        self.repo
            .save(&session)
            .await
            .context("Failed to save visitor session")?;
        Ok(session)
    }

    /// Drop sessions that expired before now
    pub async fn cleanup_expired(&self) -> Result<u64> {
        self.repo
            .delete_expired(Utc::now())
            .await
            .context("Failed to delete expired visitor sessions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxVisitorSessionRepository;
    use crate::db::{create_test_pool, migrations};
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_first_visit() {
        let session = next_visit(None, at(1, 9));
        assert_eq!(session.visits, 1);
        assert_eq!(session.last_visit, at(1, 9));
    }

    #[test]
    fn test_same_day_keeps_count() {
        let first = next_visit(None, at(1, 9));
        let again = next_visit(Some(first.clone()), at(1, 23));

        assert_eq!(again.key, first.key);
        assert_eq!(again.visits, 1);
        assert_eq!(again.last_visit, at(1, 9));
        assert!(again.expires_at > first.expires_at);
    }

    #[test]
    fn test_next_day_counts() {
        let first = next_visit(None, at(1, 9));
        // 23 hours later is still the same "day" of elapsed time.
        let early = next_visit(Some(first), at(2, 8));
        assert_eq!(early.visits, 1);

        let later = next_visit(Some(early), at(2, 9));
        assert_eq!(later.visits, 2);
        assert_eq!(later.last_visit, at(2, 9));
    }

    #[test]
    fn test_expired_session_starts_over() {
        let mut old = next_visit(None, at(1, 9));
        old.visits = 7;
        let fresh = next_visit(Some(old.clone()), old.expires_at);

        assert_ne!(fresh.key, old.key);
        assert_eq!(fresh.visits, 1);
    }

    #[tokio::test]
    async fn test_track_persists() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = VisitorService::new(SqlxVisitorSessionRepository::boxed(pool));

        let first = service.track(None, at(1, 9)).await.unwrap();
        let second = service.track(Some(&first.key), at(3, 9)).await.unwrap();
        assert_eq!(second.key, first.key);
        assert_eq!(second.visits, 2);

        let unknown = service.track(Some("forged"), at(3, 10)).await.unwrap();
        assert_ne!(unknown.key, "forged");
        assert_eq!(unknown.visits, 1);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn visits_never_decrease(gaps in proptest::collection::vec(0i64..200_000, 1..20)) {
                let mut now = at(1, 0);
                let mut session = next_visit(None, now);
                for gap in gaps {
                    now += Duration::seconds(gap);
                    let next = next_visit(Some(session.clone()), now);
                    prop_assert!(next.visits >= session.visits);
                    prop_assert!(next.visits <= session.visits + 1);
                    prop_assert_eq!(&next.key, &session.key);
                    session = next;
                }
            }
        }
    }
}
