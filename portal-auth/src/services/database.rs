use std::future::Future;
use std::time::Duration;

use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

use crate::models::{Session, User};
use crate::services::error::StoreError;

/// Upper bound for any single store call.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(10);

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Runs a store future under [`STORE_TIMEOUT`]. Expiry surfaces as
/// [`StoreError::Timeout`], never as an empty result.
pub async fn bounded<T, F>(operation: &'static str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(STORE_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(operation, "Store call timed out");
            Err(StoreError::Timeout(operation))
        }
    }
}

pub(crate) fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::BulkWrite(e) => e
            .write_errors
            .as_ref()
            .map(|errs| errs.iter().any(|e| e.code == DUPLICATE_KEY_CODE))
            .unwrap_or(false),
        _ => false,
    }
}

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for portal-auth");

        let session_indexes = [
            IndexModel::builder()
                .keys(doc! { "token": 1 })
                .options(
                    IndexOptions::builder()
                        .name("token_idx".to_string())
                        .unique(true)
                        .build(),
                )
                .build(),
            // Range deletes by the sweeper.
            IndexModel::builder()
                .keys(doc! { "expires_at": 1 })
                .options(
                    IndexOptions::builder()
                        .name("expires_at_idx".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "user_id": 1 })
                .options(
                    IndexOptions::builder()
                        .name("user_id_idx".to_string())
                        .build(),
                )
                .build(),
        ];

        self.sessions()
            .create_indexes(session_indexes, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create session indexes: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        let user_indexes = [
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(
                    IndexOptions::builder()
                        .name("email_idx".to_string())
                        .unique(true)
                        .build(),
                )
                .build(),
            // Federated-only accounts have no username.
            IndexModel::builder()
                .keys(doc! { "username": 1 })
                .options(
                    IndexOptions::builder()
                        .name("username_idx".to_string())
                        .unique(true)
                        .sparse(true)
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "external_id": 1 })
                .options(
                    IndexOptions::builder()
                        .name("external_id_idx".to_string())
                        .unique(true)
                        .sparse(true)
                        .build(),
                )
                .build(),
        ];

        self.users()
            .create_indexes(user_indexes, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create user indexes: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        bounded("ping", async {
            self.client
                .database("admin")
                .run_command(doc! { "ping": 1 }, None)
                .await
                .map_err(|e| {
                    tracing::error!("MongoDB health check failed: {}", e);
                    StoreError::from(e)
                })?;
            Ok(())
        })
        .await
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn sessions(&self) -> Collection<Session> {
        self.db.collection("sessions")
    }
}
