//! Sessions minted at the end of a successful `sso_get_token` login.

use chrono::{DateTime, Duration, Utc};
use fedgate_core::{SessionId, UserId};
use serde::{Deserialize, Serialize};

/// An issued login session.
///
/// The session ID doubles as the opaque bearer token handed to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session for `user_id`, valid for `duration` from now.
    #[must_use]
    pub fn new(user_id: UserId, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            user_id,
            created_at: now,
            expires_at: now + duration,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the token presented by the client.
    #[must_use]
    pub fn token(&self) -> String {
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_live() {
        let user_id = UserId::new();
        let session = Session::new(user_id, Duration::hours(1));
        assert_eq!(session.user_id(), user_id);
        assert!(session.expires_at() > Utc::now());
        assert_eq!(session.expires_at() - session.created_at(), Duration::hours(1));
    }

    #[test]
    fn token_is_prefixed_session_id() {
        let session = Session::new(UserId::new(), Duration::minutes(5));
        assert!(session.token().starts_with("ses_"));
        assert_eq!(session.token(), session.id().to_string());
    }
}
