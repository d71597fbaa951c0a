use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::FindOptions};

use crate::models::User;
use crate::services::database::{bounded, is_duplicate_key, MongoDb};
use crate::services::error::StoreError;

/// Lookup and persistence of user records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fails with [`StoreError::WriteFailure`] when email, username or
    /// external id is already taken.
    async fn create(&self, user: &User) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError>;
    /// Replaces the whole record. Concurrent updates are last-writer-wins.
    async fn update(&self, user: &User) -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
}

#[derive(Clone)]
pub struct MongoUserDirectory {
    db: MongoDb,
}

impl MongoUserDirectory {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    async fn find_one_by(
        &self,
        operation: &'static str,
        filter: mongodb::bson::Document,
    ) -> Result<Option<User>, StoreError> {
        bounded(operation, async {
            self.db.users().find_one(filter, None).await.map_err(|e| {
                tracing::error!(operation, "Failed to query users: {}", e);
                StoreError::from(e)
            })
        })
        .await
    }
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        bounded("create_user", async {
            self.db.users().insert_one(user, None).await.map_err(|e| {
                if is_duplicate_key(&e) {
                    tracing::warn!(user_id = %user.id, "User insert hit a unique index");
                } else {
                    tracing::error!(user_id = %user.id, "Failed to insert user: {}", e);
                }
                StoreError::WriteFailure(e.to_string())
            })?;
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.find_one_by("find_user_by_id", doc! { "_id": id }).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one_by("find_user_by_email", doc! { "email": email })
            .await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_one_by("find_user_by_username", doc! { "username": username })
            .await
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        self.find_one_by("find_user_by_external_id", doc! { "external_id": external_id })
            .await
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        bounded("update_user", async {
            let result = self
                .db
                .users()
                .replace_one(doc! { "_id": &user.id }, user, None)
                .await
                .map_err(|e| {
                    tracing::error!(user_id = %user.id, "Failed to update user: {}", e);
                    StoreError::WriteFailure(e.to_string())
                })?;

            if result.matched_count == 0 {
                return Err(StoreError::WriteFailure(format!(
                    "user {} does not exist",
                    user.id
                )));
            }
            Ok(())
        })
        .await
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        bounded("list_users", async {
            let options = FindOptions::builder()
                .sort(doc! { "created_at": 1 })
                .build();
            let cursor = self.db.users().find(None, options).await.map_err(|e| {
                tracing::error!("Failed to list users: {}", e);
                StoreError::from(e)
            })?;
            cursor.try_collect::<Vec<User>>().await.map_err(|e| {
                tracing::error!("Failed to read user cursor: {}", e);
                StoreError::from(e)
            })
        })
        .await
    }
}

/// Process-local directory for tests and `DATA_SOURCE=memory`.
///
/// A single lock covers the uniqueness check and the insert so concurrent
/// registrations cannot both claim the same email.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn conflict(existing: &User, candidate: &User) -> Option<&'static str> {
        if existing.id == candidate.id {
            return None;
        }
        if existing.email == candidate.email {
            return Some("email");
        }
        if candidate.username.is_some() && existing.username == candidate.username {
            return Some("username");
        }
        if candidate.external_id.is_some() && existing.external_id == candidate.external_id {
            return Some("external_id");
        }
        None
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, User>>, StoreError> {
        self.users
            .read()
            .map_err(|e| StoreError::Unavailable(format!("user directory lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, User>>, StoreError> {
        self.users
            .write()
            .map_err(|e| StoreError::Unavailable(format!("user directory lock poisoned: {}", e)))
    }

    fn find_by<P>(&self, predicate: P) -> Result<Option<User>, StoreError>
    where
        P: Fn(&User) -> bool,
    {
        Ok(self.read()?.values().find(|u| predicate(u)).cloned())
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn create(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.write()?;
        if users.contains_key(&user.id) {
            return Err(StoreError::WriteFailure(format!("duplicate id {}", user.id)));
        }
        if let Some(field) = users.values().find_map(|u| Self::conflict(u, user)) {
            return Err(StoreError::WriteFailure(format!("duplicate {}", field)));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_by(|u| u.email == email)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_by(|u| u.username.as_deref() == Some(username))
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<User>, StoreError> {
        self.find_by(|u| u.external_id.as_deref() == Some(external_id))
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.write()?;
        if !users.contains_key(&user.id) {
            return Err(StoreError::WriteFailure(format!(
                "user {} does not exist",
                user.id
            )));
        }
        if let Some(field) = users.values().find_map(|u| Self::conflict(u, user)) {
            return Err(StoreError::WriteFailure(format!("duplicate {}", field)));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.read()?.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }
}
