//! Tracing setup for the pdfscribe server.
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Config;

const LOG_FILE_VAR: &str = "PDFSCRIBE_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "pdfscribe.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install a compact stdout subscriber mirrored to the log file.
///
/// `RUST_LOG` filters both outputs (default `info`). Later calls keep the first subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let file_layer = open_log_writer().map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact()
    });
    // Option<Layer> is itself a layer, so a missing file simply disables the mirror.
    if let Err(err) = registry.with(file_layer).try_init() {
        eprintln!("Tracing subscriber already installed: {err}");
    }
}

/// Emit the effective settings once tracing is live.
///
/// The API key itself never reaches the logs; only whether one is present.
pub fn log_config_summary(config: &Config) {
    tracing::info!(
        base_url = %config.openai_base_url,
        has_api_key = config.openai_api_key.is_some(),
        vector_store_id = ?config.vector_store_id,
        assistant_id = ?config.assistant_id,
        model = %config.assistant_model,
        run_scope = ?config.run_scope,
        lazy_bootstrap = config.lazy_bootstrap,
        poll_timeout_secs = config.poll_timeout_secs,
        max_upload_bytes = config.max_upload_bytes,
        "Loaded configuration"
    );
}

/// Where the file mirror writes: `PDFSCRIBE_LOG_FILE` when set, else `logs/pdfscribe.log`.
fn log_file_path() -> PathBuf {
    std::env::var(LOG_FILE_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR).join(DEFAULT_LOG_FILE))
}

/// Open the log file in append mode behind a non-blocking writer.
///
/// Upload digests and full upstream error chains end up here, while HTTP callers only see the
/// short message. Returns `None` when the file cannot be opened.
fn open_log_writer() -> Option<NonBlocking> {
    let path = log_file_path();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        if let Err(err) = std::fs::create_dir_all(parent) {
            eprintln!("Failed to create log directory {}: {err}", parent.display());
            return None;
        }
    }
    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            return None;
        }
    };
    let (writer, guard) = tracing_appender::non_blocking(file);
    let _ = LOG_GUARD.set(guard);
    Some(writer)
}
