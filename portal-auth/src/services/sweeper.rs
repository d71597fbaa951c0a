use std::time::Duration;

use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::services::{metrics, AuthService};

/// Periodically purges expired sessions. Failures are logged and the loop
/// keeps going; abort the handle to stop it.
pub fn spawn_session_sweeper(auth: AuthService, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match auth.cleanup_expired_sessions().await {
                Ok(0) => tracing::debug!("No expired sessions to sweep"),
                Ok(removed) => {
                    metrics::record_sessions_swept(removed);
                    tracing::info!(removed, "Expired sessions swept");
                }
                Err(e) => tracing::error!(error = %e, "Session sweep failed"),
            }
        }
    })
}
