//! Logging initialization
//!
//! Code logs through the `log` facade. At startup the records are bridged into a
//! `tracing` subscriber that writes to the console and to a log file.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Initialize logger for both console and file output
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
///
/// # Arguments
/// * `log_file_path` - Path to the log file (appended to, created if missing)
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to open the file or a logger was already installed
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("Failed to open log file {}", log_file_path))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(true)
        .with_writer(std::io::stdout.and(Arc::new(log_file)))
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to install tracing subscriber")?;
    tracing_log::LogTracer::init().context("Failed to bridge log records into tracing")?;

    Ok(())
}

/// Logs the effective configuration at startup, without secrets.
pub fn log_startup_configuration() {
    use crate::core::config;

    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("  • Database: {}", config::DATABASE_PATH.as_str());
    log::info!("  • Log file: {}", config::LOG_FILE_PATH.as_str());
    match *config::WEB_PORT {
        0 => log::info!("  • Dashboard API: disabled"),
        port => log::info!("  • Dashboard API port: {}", port),
    }
    log::info!("  • Admins: {}", config::admin::ADMIN_IDS.len());
    log::info!("  • Reviewers from env: {}", config::admin::REVIEWER_IDS.len());
    if config::analytics::API_URL.is_some() && config::analytics::API_KEY.is_some() {
        log::info!("  • Analytics: enabled");
    } else {
        log::warn!("  • Analytics: not configured, events will be skipped");
    }
    if config::sheets::API_KEY.is_some() && config::sheets::CLIENT_SHEET_ID.is_some() {
        log::info!("  • Client lookup: enabled");
    } else {
        log::info!("  • Client lookup: not configured");
    }
}
