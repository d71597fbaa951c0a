use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use mongodb::bson::{doc, DateTime as BsonDateTime};

use crate::models::Session;
use crate::services::database::{bounded, is_duplicate_key, MongoDb};
use crate::services::error::StoreError;

/// Durable token -> session mapping.
///
/// Lookups honour expiry on read: a session past `expires_at` is reported as
/// absent even while its record still exists.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fails with [`StoreError::WriteFailure`] when the token already exists.
    async fn create(&self, session: &Session) -> Result<(), StoreError>;
    async fn get_by_token(&self, token: &str) -> Result<Option<Session>, StoreError>;
    /// Idempotent.
    async fn delete(&self, token: &str) -> Result<(), StoreError>;
    /// Removes sessions whose expiry is strictly before now.
    async fn delete_expired(&self) -> Result<u64, StoreError>;
    async fn delete_all_for_user(&self, user_id: &str) -> Result<u64, StoreError>;
    async fn health_check(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct MongoSessionStore {
    db: MongoDb,
}

impl MongoSessionStore {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }
}

fn bson_now() -> BsonDateTime {
    BsonDateTime::from_chrono(Utc::now())
}

#[async_trait]
impl SessionStore for MongoSessionStore {
    async fn create(&self, session: &Session) -> Result<(), StoreError> {
        bounded("create_session", async {
            self.db
                .sessions()
                .insert_one(session, None)
                .await
                .map_err(|e| {
                    if is_duplicate_key(&e) {
                        tracing::error!(user_id = %session.user_id, "Session token collision");
                    } else {
                        tracing::error!(user_id = %session.user_id, "Failed to insert session: {}", e);
                    }
                    StoreError::WriteFailure(e.to_string())
                })?;
            Ok(())
        })
        .await
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        bounded("get_session", async {
            self.db
                .sessions()
                .find_one(doc! { "token": token, "expires_at": { "$gt": bson_now() } }, None)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to look up session: {}", e);
                    StoreError::from(e)
                })
        })
        .await
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        bounded("delete_session", async {
            self.db
                .sessions()
                .delete_one(doc! { "token": token }, None)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to delete session: {}", e);
                    StoreError::from(e)
                })?;
            Ok(())
        })
        .await
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        bounded("delete_expired_sessions", async {
            let result = self
                .db
                .sessions()
                .delete_many(doc! { "expires_at": { "$lt": bson_now() } }, None)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to delete expired sessions: {}", e);
                    StoreError::from(e)
                })?;
            Ok(result.deleted_count)
        })
        .await
    }

    async fn delete_all_for_user(&self, user_id: &str) -> Result<u64, StoreError> {
        bounded("delete_user_sessions", async {
            let result = self
                .db
                .sessions()
                .delete_many(doc! { "user_id": user_id }, None)
                .await
                .map_err(|e| {
                    tracing::error!(user_id = %user_id, "Failed to delete user sessions: {}", e);
                    StoreError::from(e)
                })?;
            Ok(result.deleted_count)
        })
        .await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.db.health_check().await
    }
}

/// Process-local store for tests and `DATA_SOURCE=memory`.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Physically stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn sweep_before(&self, now: DateTime<Utc>) -> u64 {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at >= now);
        before.saturating_sub(self.sessions.len()) as u64
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &Session) -> Result<(), StoreError> {
        match self.sessions.entry(session.token.clone()) {
            Entry::Occupied(_) => Err(StoreError::WriteFailure(
                "session token already exists".to_string(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(())
            }
        }
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let now = Utc::now();
        Ok(self
            .sessions
            .get(token)
            .filter(|s| !s.is_expired_at(now))
            .map(|s| s.value().clone()))
    }

    async fn delete(&self, token: &str) -> Result<(), StoreError> {
        self.sessions.remove(token);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        Ok(self.sweep_before(Utc::now()))
    }

    async fn delete_all_for_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.user_id != user_id);
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
