use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        admin::{
            UpdateApprovalRequest, UpdateRoleRequest, UserListResponse, UserResponse,
            UserUpdatedResponse,
        },
        ErrorResponse,
    },
    middleware::AuthUser,
    models::SanitizedUser,
    services::ServiceError,
    utils::ValidatedJson,
    AppState,
};

/// On admin routes a missing target is a 404, not an authentication failure.
fn admin_error(err: ServiceError) -> AppError {
    match err {
        ServiceError::UserNotFound => AppError::NotFound(anyhow::anyhow!("User not found")),
        other => other.into(),
    }
}

/// Get the current user's profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Invalid or expired session", body = ErrorResponse)
    ),
    tag = "Users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(UserResponse {
        user: user.sanitized(),
    })
}

/// List all users (admin only)
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = UserListResponse),
        (status = 401, description = "Invalid or expired session", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions", body = ErrorResponse)
    ),
    tag = "Users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    auth.require_admin()?;

    let users: Vec<SanitizedUser> = state
        .user_service
        .list_users()
        .await?
        .into_iter()
        .map(SanitizedUser::from)
        .collect();

    Ok(Json(UserListResponse {
        total: users.len(),
        users,
    }))
}

/// Approve or revoke approval of a user (admin only)
#[utoipa::path(
    put,
    path = "/api/users/{id}/approve",
    params(
        ("id" = String, Path, description = "User id")
    ),
    request_body = UpdateApprovalRequest,
    responses(
        (status = 200, description = "Approval updated", body = UserUpdatedResponse),
        (status = 401, description = "Invalid or expired session", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions or admin target", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_approval(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateApprovalRequest>,
) -> Result<impl IntoResponse, AppError> {
    let admin = auth.require_admin()?;

    let user = state
        .user_service
        .update_approval(&id, req.approved)
        .await
        .map_err(admin_error)?;

    tracing::info!(admin_id = %admin.id, user_id = %user.id, approved = req.approved, "Approval changed by admin");

    Ok(Json(UserUpdatedResponse {
        success: true,
        message: "User approval updated".to_string(),
        user: user.sanitized(),
    }))
}

/// Change a user's role to `user` or `editor` (admin only)
#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    params(
        ("id" = String, Path, description = "User id")
    ),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserUpdatedResponse),
        (status = 400, description = "Role cannot be assigned", body = ErrorResponse),
        (status = 401, description = "Invalid or expired session", body = ErrorResponse),
        (status = 403, description = "Insufficient permissions or admin target", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    tag = "Users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let admin = auth.require_admin()?;

    let user = state
        .user_service
        .update_role(&id, &req.role)
        .await
        .map_err(admin_error)?;

    tracing::info!(admin_id = %admin.id, user_id = %user.id, role = %user.role, "Role changed by admin");

    Ok(Json(UserUpdatedResponse {
        success: true,
        message: "User role updated".to_string(),
        user: user.sanitized(),
    }))
}
