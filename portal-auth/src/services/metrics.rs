use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static AUTH_LOGINS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static AUTH_SESSIONS_SWEPT_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Builds and registers every collector. Safe to call more than once; only the
/// first call installs the globals.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;

    let request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )?;

    let logins_total = IntCounterVec::new(
        Opts::new("auth_logins_total", "Login attempts by method and outcome"),
        &["method", "outcome"],
    )?;

    let sessions_swept = IntCounter::new(
        "auth_sessions_swept_total",
        "Expired sessions physically removed by the sweeper",
    )?;

    registry.register(Box::new(requests_total.clone()))?;
    registry.register(Box::new(request_duration.clone()))?;
    registry.register(Box::new(logins_total.clone()))?;
    registry.register(Box::new(sessions_swept.clone()))?;

    // Lost a concurrent init race; the winner installs the collectors.
    if REGISTRY.set(registry).is_err() {
        return Ok(());
    }
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = AUTH_LOGINS_TOTAL.set(logins_total);
    let _ = AUTH_SESSIONS_SWEPT_TOTAL.set(sessions_swept);
    Ok(())
}

/// `method` is `local` or `federated`.
pub fn record_login(method: &str, outcome: &str) {
    if let Some(counter) = AUTH_LOGINS_TOTAL.get() {
        counter.with_label_values(&[method, outcome]).inc();
    }
}

pub fn record_sessions_swept(count: u64) {
    if let Some(counter) = AUTH_SESSIONS_SWEPT_TOTAL.get() {
        counter.inc_by(count);
    }
}

pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}
