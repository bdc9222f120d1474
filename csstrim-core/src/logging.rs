//! Structured logging using **tracing**.
//!
//! Library code emits `tracing` events; the CLI installs the JSON subscriber
//! once at startup. Events go to stderr so stdout stays clean for reports.

use std::path::Path;

use tracing::{error, info, warn};

use crate::error::CsstrimError;

/// Initializes the global tracing subscriber.
///
/// Call once at the beginning of the process.
///
/// # Environment Variables
/// - `RUST_LOG`: Controls log filtering (e.g., `RUST_LOG=csstrim_core=debug`)
pub fn init_structured_logging() {
    tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_level(true)
        .with_target(true)
        .with_current_span(true)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

/// Logs the outcome of pruning one stylesheet.
pub fn log_sheet_summary(path: &Path, kept: usize, removed: usize, dry_run: bool) {
    info!(
        stylesheet = %path.display(),
        kept,
        removed,
        dry_run,
        "stylesheet pruned"
    );
}

/// Logs a glob pattern that matched nothing.
pub fn log_empty_glob(option: &str, pattern: &str) {
    warn!(option = %option, pattern = %pattern, "glob matched no files");
}

/// Logs an error with its kind and path, if any.
pub fn log_error(err: &CsstrimError) {
    match err.path() {
        Some(path) => error!(kind = err.kind(), path = %path.display(), detail = %err),
        None => error!(kind = err.kind(), detail = %err),
    }
}
