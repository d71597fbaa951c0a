//! Identity federation against an OAuth2 authorization-code provider.
//!
//! The broker is stateless: it builds consent URLs, trades codes for access
//! tokens and resolves tokens to identities. Checking the `state` value that
//! comes back on the callback is left to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use thiserror::Error;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const SCOPES: &str = "https://www.googleapis.com/auth/userinfo.email \
                      https://www.googleapis.com/auth/userinfo.profile";

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum FederationError {
    #[error("Identity federation is not configured")]
    NotConfigured,

    #[error("Invalid provider endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Authorization code exchange failed: {0}")]
    ExchangeFailure(String),

    #[error("Identity resolution failed: {0}")]
    IdentityResolutionFailure(String),
}

/// Provider client registration and endpoints.
///
/// Missing client id, secret or redirect URL leaves the broker inert: it can
/// be constructed but every call fails with [`FederationError::NotConfigured`].
#[derive(Clone, Debug)]
pub struct FederationConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<Secret<String>>,
    pub redirect_url: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_url: None,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }
}

/// Access token issued by the provider. Never logged.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub secret: Secret<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    /// Requested through offline access; kept but not yet used.
    pub refresh_token: Option<Secret<String>>,
}

/// Identity as reported by the provider's userinfo endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FederatedIdentity {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub verified_email: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

#[async_trait]
pub trait IdentityFederation: Send + Sync {
    /// Consent redirect carrying `state`, email+profile scopes and offline access.
    fn authorization_url(&self, state: &str) -> Result<String, FederationError>;
    async fn exchange_code(&self, code: &str) -> Result<AccessToken, FederationError>;
    async fn resolve_identity(&self, token: &AccessToken)
        -> Result<FederatedIdentity, FederationError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error: Option<String>,
}

struct Registration<'a> {
    client_id: &'a str,
    client_secret: &'a Secret<String>,
    redirect_url: &'a str,
}

#[derive(Clone)]
pub struct GoogleFederationBroker {
    client: Client,
    config: FederationConfig,
}

impl GoogleFederationBroker {
    pub fn new(config: FederationConfig) -> Self {
        let client = Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.registration().is_ok()
    }

    fn registration(&self) -> Result<Registration<'_>, FederationError> {
        match (
            self.config.client_id.as_deref(),
            self.config.client_secret.as_ref(),
            self.config.redirect_url.as_deref(),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_url))
                if !client_id.is_empty() && !redirect_url.is_empty() =>
            {
                Ok(Registration {
                    client_id,
                    client_secret,
                    redirect_url,
                })
            }
            _ => Err(FederationError::NotConfigured),
        }
    }
}

/// Provider's `error` code if the body carries one. Bodies are not logged whole.
async fn provider_error(response: reqwest::Response) -> String {
    let status = response.status();
    let body: ProviderErrorBody = response.json().await.unwrap_or_default();
    match body.error {
        Some(code) => format!("{} ({})", status, code),
        None => status.to_string(),
    }
}

#[async_trait]
impl IdentityFederation for GoogleFederationBroker {
    fn authorization_url(&self, state: &str) -> Result<String, FederationError> {
        let reg = self.registration()?;
        let url = Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("access_type", "offline"),
                ("client_id", reg.client_id),
                ("redirect_uri", reg.redirect_url),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
            ],
        )
        .map_err(|e| FederationError::InvalidEndpoint(format!("{}: {}", self.config.auth_url, e)))?;

        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<AccessToken, FederationError> {
        let reg = self.registration()?;

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("code", code),
                ("client_id", reg.client_id),
                ("client_secret", reg.client_secret.expose_secret().as_str()),
                ("redirect_uri", reg.redirect_url),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Token endpoint unreachable");
                FederationError::ExchangeFailure(e.to_string())
            })?;

        if !response.status().is_success() {
            let reason = provider_error(response).await;
            tracing::warn!(reason = %reason, "Provider rejected authorization code");
            return Err(FederationError::ExchangeFailure(reason));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Malformed token response");
            FederationError::ExchangeFailure(format!("malformed token response: {}", e))
        })?;

        Ok(AccessToken {
            secret: Secret::new(token.access_token),
            token_type: token.token_type,
            expires_in: token.expires_in,
            refresh_token: token.refresh_token.map(Secret::new),
        })
    }

    async fn resolve_identity(
        &self,
        token: &AccessToken,
    ) -> Result<FederatedIdentity, FederationError> {
        self.registration()?;

        let response = self
            .client
            .get(&self.config.userinfo_url)
            .bearer_auth(token.secret.expose_secret())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Userinfo endpoint unreachable");
                FederationError::IdentityResolutionFailure(e.to_string())
            })?;

        if !response.status().is_success() {
            let reason = provider_error(response).await;
            tracing::warn!(reason = %reason, "Provider rejected access token");
            return Err(FederationError::IdentityResolutionFailure(reason));
        }

        response.json::<FederatedIdentity>().await.map_err(|e| {
            tracing::error!(error = %e, "Malformed userinfo response");
            FederationError::IdentityResolutionFailure(format!("malformed userinfo: {}", e))
        })
    }
}
