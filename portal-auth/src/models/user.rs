//! User model - portal accounts, local or federated.

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Authorization level checked by downstream handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::User => "user",
        }
    }

    /// Roles an administrator may hand out. Admin is provisioned out of band.
    pub fn is_assignable(&self) -> bool {
        matches!(self, Role::Editor | Role::User)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "user" => Ok(Role::User),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// How the account authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    /// Signed in through the identity provider. Older records carry `google`.
    #[serde(alias = "google")]
    Federated,
}

/// User entity as persisted by the user directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Argon2 PHC string; empty for federated-only accounts.
    #[serde(default)]
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub auth_provider: AuthProvider,
    #[serde(default)]
    pub approved: bool,
    pub role: Role,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Self-registered local account: unapproved, plain user role.
    pub fn new_local(name: String, email: String, username: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            username: Some(username),
            password_hash,
            external_id: None,
            picture: None,
            auth_provider: AuthProvider::Local,
            approved: false,
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }

    /// First sign-in through the identity provider.
    pub fn new_federated(
        external_id: String,
        email: String,
        name: String,
        picture: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            username: None,
            password_hash: String::new(),
            external_id: Some(external_id),
            picture,
            auth_provider: AuthProvider::Federated,
            approved: false,
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins bypass the approval gate.
    pub fn is_cleared(&self) -> bool {
        self.approved || self.is_admin()
    }

    pub fn sanitized(&self) -> SanitizedUser {
        SanitizedUser::from(self.clone())
    }
}

/// User as exposed over the API: no password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SanitizedUser {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: String,
    #[schema(example = "Alice")]
    pub name: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub auth_provider: AuthProvider,
    pub approved: bool,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for SanitizedUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            username: u.username,
            picture: u.picture,
            auth_provider: u.auth_provider,
            approved: u.approved,
            role: u.role,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}
