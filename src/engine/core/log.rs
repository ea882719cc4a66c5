use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Debug log written to the current directory when enabled
pub const DEBUG_LOG_FILE: &str = "ffjob.log";

/// Install the global subscriber.
///
/// Stderr gets warnings by default and everything down to debug with
/// `verbose`. With `debug_file`, debug output is also appended to
/// [`DEBUG_LOG_FILE`].
pub fn init_logging(verbose: bool, debug_file: bool) -> Result<Option<PathBuf>> {
    let stderr_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_level);

    let mut log_path = None;
    let file_layer = if debug_file {
        let path = std::env::current_dir()?.join(DEBUG_LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        log_path = Some(path);
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(LevelFilter::DEBUG),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Logging already initialized")?;

    Ok(log_path)
}
