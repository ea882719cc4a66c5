//! Error taxonomy for the job engine.
//!
//! Build-time errors are returned synchronously from submission. Run-time
//! errors never cross the event boundary: they are folded into the terminal
//! `ProgressEvent` of the job.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No usable transcoder executable configured")]
    TranscoderUnavailable,

    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Probe failed for {}: {reason}", path.display())]
    ProbeFailure { path: PathBuf, reason: String },

    #[error("Invalid duration {0}: probe the source before computing a target bitrate")]
    InvalidDuration(f64),

    #[error("Invalid job options: {0}")]
    InvalidOptions(String),

    #[error("Job {0} already has a running process")]
    AlreadyRunning(Uuid),

    #[error("Failed to spawn transcoder: {0}")]
    ProcessSpawnError(#[source] std::io::Error),

    #[error("Transcoder exited with {}", exit_code_label(.code))]
    ProcessExitError { code: Option<i32> },

    #[error("Job cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
