//! # Structured Logging Module
//!
//! Environment-aware structured logging for the worker process. Console output
//! is human-readable by default and switches to JSON lines when
//! `SHIPTRACK_LOG_FORMAT=json`.

use crate::state_machine::ShipmentStatus;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let console = if json_output_requested() {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // A subscriber installed by an embedding application takes precedence.
        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("SHIPTRACK_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn json_output_requested() -> bool {
    std::env::var("SHIPTRACK_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log a committed status change
pub fn log_status_transition(
    shipment_id: i64,
    carrier: &str,
    from: ShipmentStatus,
    to: ShipmentStatus,
    holder_id: &str,
) {
    tracing::info!(
        shipment_id = shipment_id,
        carrier = %carrier,
        from = %from,
        to = %to,
        holder_id = %holder_id,
        "SHIPMENT_STATUS_TRANSITION"
    );
}

/// Log the outcome of one scheduler tick
#[allow(clippy::too_many_arguments)]
pub fn log_tick_summary(
    holder_id: &str,
    claimed: usize,
    committed: usize,
    unchanged: usize,
    failed: usize,
    skipped_on_cancel: usize,
    duration_ms: u64,
) {
    tracing::info!(
        holder_id = %holder_id,
        claimed = claimed,
        committed = committed,
        unchanged = unchanged,
        failed = failed,
        skipped_on_cancel = skipped_on_cancel,
        duration_ms = duration_ms,
        "WORKER_TICK"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, shipment_id: Option<i64>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        shipment_id = shipment_id,
        "WORKER_ERROR"
    );
}
