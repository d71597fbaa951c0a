use service_core::error::AppError;
use thiserror::Error;

use crate::services::federation::FederationError;

/// Persistence failures shared by the session store and the user directory.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store operation '{0}' timed out")]
    Timeout(&'static str),

    #[error("Store rejected write: {0}")]
    WriteFailure(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Federation(#[from] FederationError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Username already taken")]
    DuplicateUsername,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account pending approval")]
    PendingApproval,

    #[error("Invalid or expired session")]
    SessionInvalid,

    #[error("Admin accounts cannot be modified")]
    AdminImmutable,

    #[error("Invalid role: {0}")]
    InvalidRole(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Store(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Federation(FederationError::NotConfigured) => {
                AppError::ConfigError(anyhow::anyhow!("Identity federation is not configured"))
            }
            ServiceError::Federation(e) => {
                tracing::warn!(error = %e, "Identity federation failed");
                AppError::BadGateway(anyhow::anyhow!("Identity provider request failed"))
            }
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InvalidInput(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::DuplicateEmail => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::DuplicateUsername => {
                AppError::Conflict(anyhow::anyhow!("Username already taken"))
            }
            // Unknown user and wrong password look the same from outside.
            ServiceError::UserNotFound | ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::SessionInvalid => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid or expired session"))
            }
            ServiceError::PendingApproval => {
                AppError::Forbidden(anyhow::anyhow!("Account pending approval"))
            }
            ServiceError::AdminImmutable => {
                AppError::Forbidden(anyhow::anyhow!("Admin accounts cannot be modified"))
            }
            ServiceError::InvalidRole(role) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid role: {}", role))
            }
        }
    }
}
