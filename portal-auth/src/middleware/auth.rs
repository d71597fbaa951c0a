use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::{
    models::{Role, User},
    services::ServiceError,
    AppState,
};

/// Token from `Authorization: Bearer <token>`. `None` for a missing header,
/// another scheme or an empty token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Rejects requests without a live session and attaches the session's user
/// to the request for downstream handlers.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // CORS preflight carries no credentials.
    if req.method() == Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let token = extract_bearer_token(req.headers()).ok_or_else(|| {
        AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
    })?;

    let user = match state.auth_service.validate_session(token).await {
        Ok(user) => user,
        Err(ServiceError::SessionInvalid | ServiceError::UserNotFound) => {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Invalid or expired session"
            )));
        }
        Err(e) => return Err(e.into()),
    };

    req.extensions_mut().insert(AuthUser(user));

    Ok(next.run(req).await)
}

/// The user resolved by [`session_auth_middleware`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    /// Role check for handlers. Evaluated per request, never cached.
    pub fn require_role(&self, allowed: &[Role]) -> Result<&User, AppError> {
        if allowed.contains(&self.0.role) {
            Ok(&self.0)
        } else {
            tracing::warn!(user_id = %self.0.id, role = %self.0.role, "Insufficient role");
            Err(AppError::Forbidden(anyhow::anyhow!("Insufficient permissions")))
        }
    }

    pub fn require_admin(&self) -> Result<&User, AppError> {
        self.require_role(&[Role::Admin])
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthUser>().cloned().ok_or_else(|| {
            tracing::error!("AuthUser extracted on a route without session_auth_middleware");
            AppError::Unauthorized(anyhow::anyhow!("Authentication required"))
        })
    }
}
