use std::sync::Arc;

use chrono::Utc;

use crate::{
    models::{Role, User},
    services::{ServiceError, UserDirectory},
};

/// Administrative operations on user records.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserDirectory>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    pub async fn get_user(&self, id: &str) -> Result<User, ServiceError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::UserNotFound)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.users.list().await?)
    }

    pub async fn update_approval(&self, id: &str, approved: bool) -> Result<User, ServiceError> {
        let mut user = self.mutable_target(id).await?;
        user.approved = approved;
        user.updated_at = Utc::now();
        self.users.update(&user).await?;

        tracing::info!(user_id = %user.id, approved, "User approval updated");
        Ok(user)
    }

    pub async fn update_role(&self, id: &str, role: &str) -> Result<User, ServiceError> {
        let new_role = role
            .parse::<Role>()
            .ok()
            .filter(Role::is_assignable)
            .ok_or_else(|| ServiceError::InvalidRole(role.to_string()))?;

        let mut user = self.mutable_target(id).await?;
        user.role = new_role;
        user.updated_at = Utc::now();
        self.users.update(&user).await?;

        tracing::info!(user_id = %user.id, role = %new_role, "User role updated");
        Ok(user)
    }

    /// Admin accounts are never changed through the API.
    async fn mutable_target(&self, id: &str) -> Result<User, ServiceError> {
        let user = self.get_user(id).await?;
        if user.is_admin() {
            tracing::warn!(user_id = %user.id, "Attempt to modify an admin account");
            return Err(ServiceError::AdminImmutable);
        }
        Ok(user)
    }
}
