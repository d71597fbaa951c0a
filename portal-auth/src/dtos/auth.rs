use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::SanitizedUser;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    #[schema(example = "Alice")]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "alice@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Username is required"))]
    #[schema(example = "alice")]
    pub username: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    #[schema(example = "secret1", min_length = 6)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "Registration successful. Your account is awaiting administrator approval.")]
    pub message: String,
    pub user: SanitizedUser,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    #[schema(example = "alice")]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "secret1")]
    pub password: String,
}

/// Returned by local and federated logins alike.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "Login successful")]
    pub message: String,
    pub user: SanitizedUser,
    #[schema(example = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")]
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ValidateSessionRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidateSessionResponse {
    #[schema(example = true)]
    pub valid: bool,
    pub user: SanitizedUser,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "Logged out")]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizationUrlResponse {
    #[schema(example = "https://accounts.google.com/o/oauth2/auth?access_type=offline&...")]
    pub auth_url: String,
    #[schema(example = "3b1f0c1e9a...")]
    pub state: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FederationCallbackQuery {
    /// Authorization code issued by the provider.
    pub code: Option<String>,
    /// Echo of the `state` handed out with the authorization URL.
    pub state: Option<String>,
    /// Set by the provider when the user denied consent.
    pub error: Option<String>,
}
