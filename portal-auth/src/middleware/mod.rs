pub mod auth;
pub mod metrics;

pub use auth::{extract_bearer_token, session_auth_middleware, AuthUser};
pub use metrics::metrics_middleware;
