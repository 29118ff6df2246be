//! Logging configuration and setup
//!
//! This module provides logging initialization and structured logging utilities
//! for the feed engine.

use std::time::Duration;

use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::config::LoggingConfig;
use crate::utils::errors::{Result, VolunteerHubError};

/// Initialize logging based on configuration.
///
/// The returned guard flushes the file appender when dropped and must be kept
/// alive for the lifetime of the process.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(&config.file_path, "volunteerhub.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(file_layer)
        .try_init()
        .map_err(|e| VolunteerHubError::Config(format!("Logging already initialized: {}", e)))?;

    info!("Logging initialized with level: {}", config.level);
    Ok(guard)
}

/// Log the completion of a feed fetch
pub fn log_fetch(query: &str, offset: usize, received: usize, elapsed: Duration) {
    debug!(
        query = query,
        offset = offset,
        received = received,
        elapsed_ms = elapsed.as_millis() as u64,
        "Feed page fetched"
    );
}

/// Log a retry decision for a failed request
pub fn log_retry(operation: &str, attempt: u32, max_attempts: u32, error: &str) {
    warn!(
        operation = operation,
        attempt = attempt,
        max_attempts = max_attempts,
        error = error,
        "Request failed, retrying"
    );
}

/// Log mutation lifecycle transitions
pub fn log_mutation(kind: &str, event_id: &str, user_id: &str, state: &str) {
    info!(
        kind = kind,
        event_id = event_id,
        user_id = user_id,
        state = state,
        "Mutation state changed"
    );
}

/// Log API errors with context
pub fn log_api_error(api: &str, error: &str, context: Option<&str>) {
    error!(
        api = api,
        error = error,
        context = context,
        "API error occurred"
    );
}
