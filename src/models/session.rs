//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Login session, referenced by the session cookie
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque token stored in the cookie
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Start a new session for `user_id` lasting `days`
    pub fn start(user_id: i64, days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            user_id,
            expires_at: now + Duration::days(days),
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_sets_expiry() {
        let session = Session::start(7, 14);
        assert_eq!(session.user_id, 7);
        assert_eq!(session.id.len(), 32);
        assert!(!session.is_expired());
        assert_eq!((session.expires_at - session.created_at).num_days(), 14);
    }

    #[test]
    fn test_past_session_is_expired() {
        let mut session = Session::start(1, 1);
        session.expires_at = Utc::now() - Duration::hours(1);
        assert!(session.is_expired());
    }
}
