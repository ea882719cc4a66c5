// Input probing by running the transcoder without an output target

use crate::engine::core::{EngineError, EngineResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use tracing::debug;

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap());
static BITRATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bitrate:\s*(\d+(?:\.\d+)?)\s*kb/s").unwrap());
static VIDEO_STREAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Stream #\d+:\d+[^\n]*?: Video:\s*([^\s,]+)([^\n]*)").unwrap());
static AUDIO_STREAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Stream #\d+:\d+[^\n]*?: Audio:").unwrap());
static STREAM_RESOLUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,](\d{2,5})x(\d{2,5})\b").unwrap());
static ANY_RESOLUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2,5})x(\d{2,5})\b").unwrap());
static FPS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*fps").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub codec_name: String,
    pub frame_rate: f64,
    pub file_size_bytes: u64,
    pub bitrate_kbps: Option<f64>,
    /// None when the source could not be inspected
    pub has_audio: Option<bool>,
}

impl Default for MediaMetadata {
    fn default() -> Self {
        Self {
            duration_seconds: 0.0,
            width: 0,
            height: 0,
            codec_name: "unknown".to_string(),
            frame_rate: 0.0,
            file_size_bytes: 0,
            bitrate_kbps: None,
            has_audio: None,
        }
    }
}

impl MediaMetadata {
    /// Duration usable as a percent denominator
    pub fn known_duration(&self) -> Option<f64> {
        (self.duration_seconds > 0.0).then_some(self.duration_seconds)
    }
}

/// Run `<transcoder> -hide_banner -i <path>` and parse its diagnostics
pub fn probe(transcoder: &Path, path: &Path) -> EngineResult<MediaMetadata> {
    let file_size = std::fs::metadata(path)
        .map_err(|_| EngineError::SourceNotFound(path.to_path_buf()))?
        .len();

    let output = Command::new(transcoder)
        .arg("-hide_banner")
        .arg("-i")
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| EngineError::ProbeFailure {
            path: path.to_path_buf(),
            reason: format!("failed to run {}: {}", transcoder.display(), e),
        })?;

    // Exits non-zero because no output is given; only the text matters
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(path = %path.display(), status = %output.status, "probe finished");

    parse_probe_output(&stderr, file_size).map_err(|reason| EngineError::ProbeFailure {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parse the transcoder's metadata dump. Fields that cannot be read fall back
/// to zero/"unknown"; only a dump with neither a duration nor a video stream
/// is rejected.
pub fn parse_probe_output(text: &str, file_size_bytes: u64) -> Result<MediaMetadata, String> {
    let duration = parse_duration(text);
    let video_stream = VIDEO_STREAM_RE.captures(text);

    if duration.is_none() && video_stream.is_none() {
        let tail = text.lines().last().unwrap_or("").trim();
        return Err(if tail.is_empty() {
            "no duration or stream information in transcoder output".to_string()
        } else {
            format!("no duration or stream information ({})", tail)
        });
    }

    let mut meta = MediaMetadata {
        duration_seconds: duration.unwrap_or(0.0),
        file_size_bytes,
        bitrate_kbps: BITRATE_RE
            .captures(text)
            .and_then(|c| c[1].parse::<f64>().ok()),
        has_audio: Some(AUDIO_STREAM_RE.is_match(text)),
        ..MediaMetadata::default()
    };

    if let Some(caps) = &video_stream {
        meta.codec_name = caps[1].to_string();
        let rest = &caps[2];
        if let Some((w, h)) = STREAM_RESOLUTION_RE
            .captures(rest)
            .and_then(|c| Some((c[1].parse().ok()?, c[2].parse().ok()?)))
        {
            meta.width = w;
            meta.height = h;
        }
        if let Some(fps) = FPS_RE.captures(rest).and_then(|c| c[1].parse().ok()) {
            meta.frame_rate = fps;
        }
    }

    if meta.width == 0 || meta.height == 0 {
        if let Some((w, h)) = ANY_RESOLUTION_RE
            .captures_iter(text)
            .filter_map(|c| Some((c[1].parse::<u32>().ok()?, c[2].parse::<u32>().ok()?)))
            .find(|&(w, h)| w > 0 && h > 0)
        {
            meta.width = w;
            meta.height = h;
        }
    }

    Ok(meta)
}

/// Parse the `Duration: HH:MM:SS[.frac]` header line into seconds
pub fn parse_duration(text: &str) -> Option<f64> {
    let caps = DURATION_RE.captures(text)?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
