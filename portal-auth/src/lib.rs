pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{PortalAuthConfig, SwaggerMode};
use crate::middleware::{metrics_middleware, session_auth_middleware};
use crate::services::{
    AuthPolicy, AuthService, IdentityFederation, SessionStore, UserDirectory, UserService,
};
use crate::utils::CredentialVerifier;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::registration::register,
        handlers::auth::session::login,
        handlers::auth::session::logout,
        handlers::auth::session::validate_session,
        handlers::auth::session::current_user,
        handlers::auth::social::google_login,
        handlers::auth::social::google_callback,
        handlers::user::get_me,
        handlers::user::list_users,
        handlers::user::update_approval,
        handlers::user::update_role,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::RegisterResponse,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::auth::ValidateSessionRequest,
            dtos::auth::ValidateSessionResponse,
            dtos::auth::LogoutResponse,
            dtos::auth::AuthorizationUrlResponse,
            dtos::admin::UpdateApprovalRequest,
            dtos::admin::UpdateRoleRequest,
            dtos::admin::UserResponse,
            dtos::admin::UserListResponse,
            dtos::admin::UserUpdatedResponse,
            models::SanitizedUser,
            models::Role,
            models::AuthProvider,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Local registration, login and session management"),
        (name = "Federation", description = "Sign-in through Google"),
        (name = "Users", description = "Profiles and administrator approval"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("opaque")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: PortalAuthConfig,
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wires the services over the given stores and sizes the rate limiters
    /// from `config`.
    pub fn new(
        config: PortalAuthConfig,
        users: Arc<dyn UserDirectory>,
        sessions: Arc<dyn SessionStore>,
        federation: Arc<dyn IdentityFederation>,
        credentials: CredentialVerifier,
    ) -> Self {
        let policy = AuthPolicy {
            federated_requires_approval: config.policy.federated_requires_approval,
        };
        let auth_service = AuthService::new(
            users.clone(),
            sessions,
            federation,
            credentials,
            policy,
        );
        let user_service = UserService::new(users);

        let limits = &config.rate_limit;
        let limiter = |attempts, window| {
            create_ip_rate_limiter(attempts, window).trust_forwarded_for(limits.trust_forwarded_for)
        };
        let login_rate_limiter = limiter(limits.login_attempts, limits.login_window_seconds);
        let register_rate_limiter =
            limiter(limits.register_attempts, limits.register_window_seconds);
        let ip_rate_limiter = limiter(limits.global_ip_limit, limits.global_ip_window_seconds);

        Self {
            config,
            auth_service,
            user_service,
            login_rate_limiter,
            register_rate_limiter,
            ip_rate_limiter,
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter(|origin| {
            // A wildcard cannot be listed next to credentials.
            if origin.as_str() == "*" {
                tracing::warn!("Ignoring wildcard CORS origin");
                return false;
            }
            true
        })
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let gated_routes = Router::new()
        .route("/auth/user", get(handlers::auth::current_user))
        .route("/users", get(handlers::user::list_users))
        .route("/users/me", get(handlers::user::get_me))
        .route("/users/:id/approve", put(handlers::user::update_approval))
        .route("/users/:id/role", put(handlers::user::update_role))
        .layer(from_fn_with_state(state.clone(), session_auth_middleware));

    let api = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/validate", post(handlers::auth::validate_session))
        .route("/auth/google", get(handlers::auth::google_login))
        .route("/auth/google/callback", get(handlers::auth::google_callback))
        .merge(login_route)
        .merge(register_route)
        .merge(gated_routes);

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .nest("/api", api);

    app = match state.config.swagger.enabled {
        SwaggerMode::Public => {
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()))
        }
        SwaggerMode::Disabled => app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        ),
    };

    let app = app
        .with_state(state.clone())
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins));

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Session store unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.auth_service.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Session store health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "session_store": "up"
        }
    })))
}
