//! Harness for the router-level integration tests.
//!
//! Every `TestApp` runs over fresh in-memory stores with cheap argon2
//! parameters, so tests are independent and need no external services.

#![allow(dead_code)]

use std::sync::Arc;

use argon2::Params;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use portal_auth::{
    build_router,
    config::PortalAuthConfig,
    models::{Role, User},
    services::{
        FederationConfig, GoogleFederationBroker, InMemorySessionStore, InMemoryUserDirectory,
        UserDirectory,
    },
    utils::{CredentialVerifier, Password},
    AppState,
};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "correct-horse";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub users: Arc<InMemoryUserDirectory>,
    pub sessions: Arc<InMemorySessionStore>,
    pub credentials: CredentialVerifier,
}

pub fn test_config() -> PortalAuthConfig {
    let mut config = PortalAuthConfig::default();
    config.log_level = "error".to_string();
    config
}

pub fn fast_credentials() -> CredentialVerifier {
    CredentialVerifier::with_params(Params::new(8, 1, 1, None).expect("valid argon2 params"))
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with(test_config())
    }

    pub fn spawn_with(config: PortalAuthConfig) -> Self {
        let users = Arc::new(InMemoryUserDirectory::new());
        let sessions = Arc::new(InMemorySessionStore::new());
        let credentials = fast_credentials();
        let broker = Arc::new(GoogleFederationBroker::new(config.federation.clone()));

        let state = AppState::new(
            config,
            users.clone(),
            sessions.clone(),
            broker,
            credentials.clone(),
        );
        let router = build_router(state.clone()).expect("router should build");

        Self {
            router,
            state,
            users,
            sessions,
            credentials,
        }
    }

    /// Federation pointed at a fake provider.
    pub fn spawn_with_provider(provider_uri: &str, mut config: PortalAuthConfig) -> Self {
        config.federation = FederationConfig {
            client_id: Some("test-client".to_string()),
            client_secret: Some(secrecy::Secret::new("test-secret".to_string())),
            redirect_url: Some("http://localhost:8081/api/auth/google/callback".to_string()),
            auth_url: format!("{}/o/oauth2/auth", provider_uri),
            token_url: format!("{}/token", provider_uri),
            userinfo_url: format!("{}/userinfo", provider_uri),
        };
        Self::spawn_with(config)
    }

    /// Inserts a local account directly into the directory.
    pub async fn seed_user(&self, username: &str, role: Role, approved: bool) -> User {
        let hash = self
            .credentials
            .hash(&Password::new(TEST_PASSWORD.to_string()))
            .expect("hash should succeed");
        let mut user = User::new_local(
            format!("{} Example", username),
            format!("{}@example.com", username),
            username.to_string(),
            hash.into_string(),
        );
        user.role = role;
        user.approved = approved;
        self.users.create(&user).await.expect("seed user");
        user
    }

    /// Seeds an approved user and logs in, returning the session token.
    pub async fn login_as(&self, username: &str, role: Role) -> (User, String) {
        let user = self.seed_user(username, role, true).await;
        let (status, body) = self
            .post_json(
                "/api/auth/login",
                serde_json::json!({ "username": username, "password": TEST_PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        let token = body["token"].as_str().expect("token").to_string();
        (user, token)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        read_json(self.send(request).await).await
    }

    pub async fn request_with_token(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();
        read_json(self.send(request).await).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request_with_token("GET", uri, token, None).await
    }
}

pub async fn read_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
