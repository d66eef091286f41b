//! Tracing setup: an append-only log file plus a terse stderr stream.
//!
//! Every event at or above the `RUST_LOG` level (default `info`) is appended
//! to `{LOGGING_PATH}/ETL_Logs.log`. Only warnings and errors reach stderr.

use crate::config::log_file;
use crate::error::ConfigError;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt as tfmt};

/// Install the global subscriber.
///
/// # Errors
///
/// [`ConfigError::Directory`] if the log file cannot be opened for appending.
pub fn init(log_dir: &Path) -> Result<(), ConfigError> {
    let path = log_file(log_dir);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| ConfigError::Directory { path, source })?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = tfmt::layer()
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(UtcTime::rfc_3339())
        .with_filter(filter);

    let stderr_layer = tfmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}
