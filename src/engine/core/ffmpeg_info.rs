use super::error::{EngineError, EngineResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Locate the transcoder: an explicit path when given, else `ffmpeg` on PATH
pub fn resolve_transcoder(configured: Option<&Path>) -> Option<PathBuf> {
    match configured {
        Some(path) if path.components().count() > 1 => path.is_file().then(|| path.to_path_buf()),
        Some(name) => which::which(name).ok(),
        None => which::which("ffmpeg").ok(),
    }
}

/// Check that `transcoder` runs and return the first line of its version banner
pub fn transcoder_version(transcoder: &Path) -> EngineResult<String> {
    let output = Command::new(transcoder)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            debug!(path = %transcoder.display(), error = %e, "transcoder did not start");
            EngineError::TranscoderUnavailable
        })?;

    if !output.status.success() {
        debug!(path = %transcoder.display(), status = %output.status, "transcoder -version failed");
        return Err(EngineError::TranscoderUnavailable);
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    Ok(version_output
        .lines()
        .next()
        .unwrap_or("Unknown version")
        .to_string())
}
