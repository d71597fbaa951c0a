//! Session model - opaque bearer tokens backed by server-side state.

use chrono::{DateTime, Duration, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

/// Server-side session keyed by its opaque token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: String, user_id: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            token,
            user_id,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    /// A session is live strictly before its expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
