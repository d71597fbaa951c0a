use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::SanitizedUser;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateApprovalRequest {
    #[schema(example = true)]
    pub approved: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateRoleRequest {
    /// `user` or `editor`.
    #[validate(length(min = 1, message = "Role is required"))]
    #[schema(example = "editor")]
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub user: SanitizedUser,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<SanitizedUser>,
    #[schema(example = 1)]
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserUpdatedResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "User approval updated")]
    pub message: String,
    pub user: SanitizedUser,
}
