use std::{net::SocketAddr, sync::Arc, time::Duration};

use portal_auth::{
    build_router,
    config::{DataSource, PortalAuthConfig},
    services::{
        metrics::init_metrics, spawn_session_sweeper, GoogleFederationBroker,
        InMemorySessionStore, InMemoryUserDirectory, MongoDb, MongoSessionStore,
        MongoUserDirectory, SessionStore, UserDirectory,
    },
    utils::CredentialVerifier,
    AppState,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::observability::init_tracing;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Fail fast on invalid configuration
    let config = PortalAuthConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    init_metrics().map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        data_source = ?config.data_source,
        "Starting portal authentication service"
    );

    let (users, sessions): (Arc<dyn UserDirectory>, Arc<dyn SessionStore>) =
        match config.data_source {
            DataSource::MongoDb => {
                let db = MongoDb::connect(
                    config.mongodb.uri.expose_secret(),
                    &config.mongodb.database,
                )
                .await?;
                db.initialize_indexes().await?;
                tracing::info!(database = %config.mongodb.database, "MongoDB initialized");

                (
                    Arc::new(MongoUserDirectory::new(db.clone())),
                    Arc::new(MongoSessionStore::new(db)),
                )
            }
            DataSource::Memory => {
                tracing::warn!("Using in-memory stores; data is lost on restart");
                (
                    Arc::new(InMemoryUserDirectory::new()),
                    Arc::new(InMemorySessionStore::new()),
                )
            }
        };

    let broker = GoogleFederationBroker::new(config.federation.clone());
    if !broker.is_configured() {
        tracing::warn!("Google credentials not set; federated login is disabled");
    }

    let state = AppState::new(
        config.clone(),
        users,
        sessions,
        Arc::new(broker),
        CredentialVerifier::default(),
    );

    let sweeper = spawn_session_sweeper(
        state.auth_service.clone(),
        Duration::from_secs(config.session_sweep_interval_seconds),
    );

    let app = build_router(state)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(Duration::from_secs(
        config.common.shutdown_grace_seconds,
    )))
    .await?;

    sweeper.abort();
    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal(grace: Duration) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    // Let in-flight requests drain
    tokio::time::sleep(grace).await;
}
