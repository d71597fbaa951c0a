use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

use crate::services::federation::{
    FederationConfig, GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, GOOGLE_USERINFO_URL,
};

#[derive(Debug, Clone)]
pub struct PortalAuthConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub data_source: DataSource,
    pub mongodb: MongoConfig,
    pub federation: FederationConfig,
    pub policy: PolicyConfig,
    pub session_sweep_interval_seconds: u64,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

/// Backing store for sessions and users.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataSource {
    MongoDb,
    Memory,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: Secret<String>,
    pub database: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PolicyConfig {
    pub federated_requires_approval: bool,
    /// Compare the callback `state` against the `oauth_state` cookie.
    pub oauth_verify_state: bool,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwaggerMode {
    Public,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub register_attempts: u32,
    pub register_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
    /// Key limits on the leftmost `X-Forwarded-For` address. Enable only
    /// behind a proxy that sets that header itself.
    pub trust_forwarded_for: bool,
}

impl Default for PortalAuthConfig {
    /// Local-development settings: in-memory stores, federation inert.
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "portal-auth".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            data_source: DataSource::Memory,
            mongodb: MongoConfig {
                uri: Secret::new("mongodb://localhost:27017".to_string()),
                database: "portal".to_string(),
            },
            federation: FederationConfig::default(),
            policy: PolicyConfig {
                federated_requires_approval: false,
                oauth_verify_state: true,
            },
            session_sweep_interval_seconds: 300,
            security: SecurityConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            },
            swagger: SwaggerConfig {
                enabled: SwaggerMode::Public,
            },
            rate_limit: RateLimitConfig {
                login_attempts: 5,
                login_window_seconds: 900,
                register_attempts: 3,
                register_window_seconds: 3600,
                global_ip_limit: 100,
                global_ip_window_seconds: 60,
                trust_forwarded_for: false,
            },
        }
    }
}

impl PortalAuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader {
            lookup: |key: &str| lookup(key).filter(|v| !v.trim().is_empty()),
        };

        let environment: Environment = env.parse("ENVIRONMENT", "dev")?;
        let is_prod = environment == Environment::Prod;
        let data_source: DataSource = env.parse("DATA_SOURCE", "mongodb")?;
        let mongo_required = is_prod && data_source == DataSource::MongoDb;

        let config = PortalAuthConfig {
            common,
            environment,
            service_name: env.get("SERVICE_NAME", Some("portal-auth"), false)?,
            service_version: env.get("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: env.get("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env.optional("OTLP_ENDPOINT"),
            data_source,
            mongodb: MongoConfig {
                uri: Secret::new(env.get(
                    "MONGODB_URI",
                    Some("mongodb://localhost:27017"),
                    mongo_required,
                )?),
                database: env.get("MONGODB_DATABASE", Some("portal"), mongo_required)?,
            },
            federation: FederationConfig {
                client_id: env.optional("GOOGLE_CLIENT_ID"),
                client_secret: env.optional("GOOGLE_CLIENT_SECRET").map(Secret::new),
                redirect_url: env.optional("GOOGLE_REDIRECT_URL"),
                auth_url: env.get("GOOGLE_AUTH_URL", Some(GOOGLE_AUTH_URL), false)?,
                token_url: env.get("GOOGLE_TOKEN_URL", Some(GOOGLE_TOKEN_URL), false)?,
                userinfo_url: env.get("GOOGLE_USERINFO_URL", Some(GOOGLE_USERINFO_URL), false)?,
            },
            policy: PolicyConfig {
                federated_requires_approval: env.parse("FEDERATED_REQUIRES_APPROVAL", "false")?,
                oauth_verify_state: env.parse("OAUTH_VERIFY_STATE", "true")?,
            },
            session_sweep_interval_seconds: env.parse("SESSION_SWEEP_INTERVAL_SECONDS", "300")?,
            security: SecurityConfig {
                allowed_origins: env
                    .get("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            swagger: SwaggerConfig {
                enabled: env.parse("ENABLE_SWAGGER", if is_prod { "disabled" } else { "public" })?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: env.parse("RATE_LIMIT_LOGIN_ATTEMPTS", "5")?,
                login_window_seconds: env.parse("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900")?,
                register_attempts: env.parse("RATE_LIMIT_REGISTER_ATTEMPTS", "3")?,
                register_window_seconds: env.parse("RATE_LIMIT_REGISTER_WINDOW_SECONDS", "3600")?,
                global_ip_limit: env.parse("RATE_LIMIT_GLOBAL_IP_LIMIT", "100")?,
                global_ip_window_seconds: env.parse("RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS", "60")?,
                trust_forwarded_for: env.parse("RATE_LIMIT_TRUST_FORWARDED_FOR", "false")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.session_sweep_interval_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_SWEEP_INTERVAL_SECONDS must be positive"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.data_source == DataSource::Memory {
                tracing::warn!("In-memory stores in production lose every session on restart");
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::warn!("Swagger is publicly accessible in production");
            }
        }

        Ok(())
    }
}

struct EnvReader<F: Fn(&str) -> Option<String>> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    /// `required` makes the default unusable (production secrets and endpoints).
    fn get(&self, key: &str, default: Option<&str>, required: bool) -> Result<String, AppError> {
        match (self.lookup)(key) {
            Some(val) => Ok(val),
            None if required => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required in production but not set",
                key
            ))),
            None => default.map(str::to_string).ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("{} is required but not set", key))
            }),
        }
    }

    fn parse<T>(&self, key: &str, default: &str) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.get(key, Some(default), false)?;
        raw.trim().parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
        })
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(DataSource::MongoDb),
            "memory" | "mock" => Ok(DataSource::Memory),
            _ => Err(format!("Invalid data source: {}", s)),
        }
    }
}

impl FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" | "true" => Ok(SwaggerMode::Public),
            "disabled" | "false" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
