use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        admin::UserResponse,
        auth::{
            LoginRequest, LoginResponse, LogoutResponse, ValidateSessionRequest,
            ValidateSessionResponse,
        },
        ErrorResponse,
    },
    middleware::{extract_bearer_token, AuthUser},
    services::{LoginOutcome, ServiceError},
    utils::ValidatedJson,
    AppState,
};

impl From<LoginOutcome> for LoginResponse {
    fn from(outcome: LoginOutcome) -> Self {
        Self {
            success: true,
            message: "Login successful".to_string(),
            user: outcome.user.sanitized(),
            token: outcome.token,
            expires_at: outcome.expires_at,
        }
    }
}

/// Login with username and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account pending approval", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many login attempts", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.auth_service.login(req).await?;
    Ok(Json(LoginResponse::from(outcome)))
}

/// Logout: deletes the session named by the bearer token.
///
/// Succeeds for tokens that are already expired or unknown.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = LogoutResponse),
        (status = 401, description = "Missing or malformed Authorization header", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = extract_bearer_token(&headers).ok_or_else(|| {
        AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
    })?;

    state.auth_service.logout(token).await?;

    Ok(Json(LogoutResponse {
        success: true,
        message: "Logged out".to_string(),
    }))
}

/// Check a session token and return its user
#[utoipa::path(
    post,
    path = "/api/auth/validate",
    request_body = ValidateSessionRequest,
    responses(
        (status = 200, description = "Session is live", body = ValidateSessionResponse),
        (status = 401, description = "Invalid or expired session", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn validate_session(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ValidateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .auth_service
        .validate_session(&req.token)
        .await
        .map_err(|e| match e {
            ServiceError::UserNotFound => ServiceError::SessionInvalid,
            other => other,
        })?;

    Ok(Json(ValidateSessionResponse {
        valid: true,
        user: user.sanitized(),
    }))
}

/// The user behind the current session
#[utoipa::path(
    get,
    path = "/api/auth/user",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Invalid or expired session", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn current_user(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(UserResponse {
        user: user.sanitized(),
    })
}
