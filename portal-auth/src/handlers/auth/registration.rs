use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{RegisterRequest, RegisterResponse},
        ErrorResponse,
    },
    utils::ValidatedJson,
    AppState,
};

/// Register a local account. The account must be approved by an admin
/// before it can log in; no session is issued here.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, pending approval", body = RegisterResponse),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 409, description = "Email or username already in use", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many registrations from this IP", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth_service.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "Registration successful. Your account is awaiting administrator approval."
                .to_string(),
            user: user.sanitized(),
        }),
    ))
}
