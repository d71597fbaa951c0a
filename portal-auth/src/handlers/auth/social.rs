use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use service_core::error::AppError;
use subtle::ConstantTimeEq;

use crate::{
    dtos::{
        auth::{AuthorizationUrlResponse, FederationCallbackQuery, LoginResponse},
        ErrorResponse,
    },
    utils::generate_random_token,
    AppState,
};

const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Start a Google login: returns the provider URL and the `state` bound to it
#[utoipa::path(
    get,
    path = "/api/auth/google",
    responses(
        (status = 200, description = "Authorization URL", body = AuthorizationUrlResponse),
        (status = 500, description = "Federation is not configured", body = ErrorResponse)
    ),
    tag = "Federation"
)]
pub async fn google_login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let oauth_state = generate_random_token();
    let auth_url = state.auth_service.authorization_url(&oauth_state)?;

    let jar = jar.add(
        Cookie::build((OAUTH_STATE_COOKIE, oauth_state.clone()))
            .path("/")
            .http_only(true)
            .secure(true)
            .max_age(time::Duration::minutes(5))
            .build(),
    );

    Ok((
        jar,
        Json(AuthorizationUrlResponse {
            auth_url,
            state: oauth_state,
        }),
    ))
}

/// Provider redirect target: exchanges the code and opens a session
#[utoipa::path(
    get,
    path = "/api/auth/google/callback",
    params(FederationCallbackQuery),
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing code, provider error or state mismatch", body = ErrorResponse),
        (status = 403, description = "Account pending approval", body = ErrorResponse),
        (status = 502, description = "Identity provider request failed", body = ErrorResponse)
    ),
    tag = "Federation"
)]
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<FederationCallbackQuery>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(error) = query.error.as_deref() {
        tracing::warn!(provider_error = %error, "Identity provider returned an error");
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Authorization was not granted"
        )));
    }

    let code = query
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Authorization code not found")))?;

    if state.config.policy.oauth_verify_state {
        let stored = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_owned());
        if !state_matches(stored.as_deref(), query.state.as_deref()) {
            tracing::warn!("OAuth state mismatch");
            return Err(AppError::BadRequest(anyhow::anyhow!("Invalid OAuth state")));
        }
    }

    let outcome = state.auth_service.complete_federated_login(code).await?;

    let jar = jar.remove(Cookie::build(OAUTH_STATE_COOKIE).path("/"));

    Ok((jar, Json(LoginResponse::from(outcome))))
}

fn state_matches(stored: Option<&str>, received: Option<&str>) -> bool {
    match (stored, received) {
        (Some(stored), Some(received)) if !stored.is_empty() => {
            stored.as_bytes().ct_eq(received.as_bytes()).into()
        }
        _ => false,
    }
}
