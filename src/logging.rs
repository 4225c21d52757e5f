//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to both console and
//! files for debugging campaign runs and provider failovers.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let log_dir = PathBuf::from("log");
        if !log_dir.exists() {
            fs::create_dir_all(&log_dir).expect("Failed to create log directory");
        }

        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_filename = format!("{environment}.{pid}.{timestamp}.log");
        let log_path = log_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&log_dir, log_filename);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true)
                    .with_filter(EnvFilter::new(log_level.clone())),
            )
            .with(
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(log_level)),
            );

        // Another subscriber may already be installed by the embedding
        // application; that is not an error.
        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = %log_path.display(),
            "Structured logging initialized"
        );

        std::mem::forget(guard);
    });
}

fn get_environment() -> String {
    std::env::var("JOURNEY_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log a customer transition with full context.
pub fn log_transition(
    customer_id: uuid::Uuid,
    from_status: Option<&str>,
    to_status: &str,
    reason: &str,
    idempotent: bool,
) {
    tracing::info!(
        customer_id = %customer_id,
        from_status = from_status,
        to_status = %to_status,
        reason = %reason,
        idempotent = idempotent,
        "CUSTOMER_TRANSITION"
    );
}

/// Log a provider invocation outcome.
pub fn log_provider_operation(
    kind: &str,
    provider_name: &str,
    task: &str,
    status: &str,
    duration_ms: Option<u64>,
) {
    tracing::info!(
        kind = %kind,
        provider = %provider_name,
        task = %task,
        status = %status,
        duration_ms = duration_ms,
        "PROVIDER_OPERATION"
    );
}
