//! Services layer for portal-auth.
//!
//! The orchestrator ([`AuthService`]) and the admin user operations sit on
//! top of three narrow seams: [`SessionStore`], [`UserDirectory`] and
//! [`IdentityFederation`]. Each has a MongoDB or HTTP implementation plus an
//! in-process one for tests and local runs.

pub mod auth;
pub mod database;
pub mod error;
pub mod federation;
pub mod metrics;
pub mod session_store;
pub mod sweeper;
pub mod user_directory;
pub mod users;

pub use auth::{AuthPolicy, AuthService, LoginOutcome, SESSION_TTL_MINUTES};
pub use database::{MongoDb, STORE_TIMEOUT};
pub use error::{ServiceError, StoreError};
pub use federation::{
    AccessToken, FederatedIdentity, FederationConfig, FederationError, GoogleFederationBroker,
    IdentityFederation,
};
pub use session_store::{InMemorySessionStore, MongoSessionStore, SessionStore};
pub use sweeper::spawn_session_sweeper;
pub use user_directory::{InMemoryUserDirectory, MongoUserDirectory, UserDirectory};
pub use users::UserService;
