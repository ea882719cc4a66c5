use super::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Compress,
    Effects,
    Trim,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Probing,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    /// Move to `next`; terminal states are final
    pub fn advance(&mut self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self = next;
        true
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    Hevc,
    Vp9,
    Av1,
}

impl VideoCodec {
    /// Default CRF when the caller supplies none
    pub fn default_crf(self) -> u32 {
        match self {
            VideoCodec::Vp9 | VideoCodec::Av1 => 30,
            VideoCodec::H264 | VideoCodec::Hevc => 23,
        }
    }

    /// Container used for generated output names
    pub fn default_container(self) -> &'static str {
        match self {
            VideoCodec::Vp9 => "webm",
            VideoCodec::H264 | VideoCodec::Hevc | VideoCodec::Av1 => "mp4",
        }
    }
}

impl std::str::FromStr for VideoCodec {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "h264" | "avc" | "x264" => Ok(VideoCodec::H264),
            "hevc" | "h265" | "x265" => Ok(VideoCodec::Hevc),
            "vp9" => Ok(VideoCodec::Vp9),
            "av1" => Ok(VideoCodec::Av1),
            other => Err(EngineError::InvalidOptions(format!(
                "unknown codec '{}'",
                other
            ))),
        }
    }
}

/// A `[start, end)` span of the source timeline, in seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Range {
    pub start: f64,
    pub end: f64,
}

impl Range {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    fn validate(&self) -> EngineResult<()> {
        if !self.start.is_finite() || !self.end.is_finite() || self.start < 0.0 {
            return Err(EngineError::InvalidOptions(format!(
                "range {}-{} is not a valid timestamp pair",
                self.start, self.end
            )));
        }
        if self.end <= self.start {
            return Err(EngineError::InvalidOptions(format!(
                "range end {} must be after start {}",
                self.end, self.start
            )));
        }
        Ok(())
    }
}

/// Encoder settings shared by every job kind that re-encodes video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodeOptions {
    #[serde(default)]
    pub codec: VideoCodec,
    #[serde(default)]
    pub crf: Option<u32>,
    /// x264-style preset name (ultrafast..veryslow)
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub hardware_acceleration: bool,
    #[serde(default = "default_true")]
    pub keep_audio: bool,
}

fn default_true() -> bool {
    true
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            codec: VideoCodec::default(),
            crf: None,
            preset: None,
            hardware_acceleration: false,
            keep_audio: true,
        }
    }
}

impl EncodeOptions {
    pub fn effective_crf(&self) -> u32 {
        self.crf.unwrap_or_else(|| self.codec.default_crf())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompressOptions {
    #[serde(default)]
    pub encode: EncodeOptions,
    /// Desired output size; switches the encoder to bitrate mode
    #[serde(default)]
    pub target_size_bytes: Option<u64>,
    /// Explicit video bitrate such as "2500k"
    #[serde(default)]
    pub video_bitrate: Option<String>,
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default)]
    pub max_height: Option<u32>,
    #[serde(default)]
    pub max_fps: Option<f64>,
    /// Output container extension, e.g. "mp4" or "webm"
    #[serde(default)]
    pub container: Option<String>,
}

impl CompressOptions {
    /// Whether the job cannot run without a probed duration
    pub fn requires_duration(&self) -> bool {
        self.target_size_bytes.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EffectsOptions {
    #[serde(default)]
    pub encode: EncodeOptions,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub flip_horizontal: bool,
    #[serde(default)]
    pub flip_vertical: bool,
    /// Clockwise rotation in degrees; multiples of 90 only
    #[serde(default)]
    pub rotate: Option<i32>,
    #[serde(default)]
    pub brightness: Option<f64>,
    #[serde(default)]
    pub contrast: Option<f64>,
    #[serde(default)]
    pub saturation: Option<f64>,
    #[serde(default)]
    pub gamma: Option<f64>,
    #[serde(default)]
    pub grayscale: bool,
    #[serde(default)]
    pub sepia: bool,
    #[serde(default)]
    pub blur: Option<f64>,
    #[serde(default)]
    pub noise: Option<u32>,
    #[serde(default)]
    pub sharpen: Option<f64>,
    #[serde(default)]
    pub vintage: bool,
    #[serde(default)]
    pub reverse: bool,
}

impl EffectsOptions {
    /// Playback speed factor actually applied (1.0 when unset)
    pub fn speed_factor(&self) -> f64 {
        self.speed.unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrimMode {
    /// Keep the ranges; one range is a stream copy, several are concatenated
    #[default]
    Trim,
    /// Keep the ranges and join them into one re-encoded output
    Cut,
    /// One stream-copied output per range
    Split,
}

impl std::str::FromStr for TrimMode {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trim" => Ok(TrimMode::Trim),
            "cut" => Ok(TrimMode::Cut),
            "split" => Ok(TrimMode::Split),
            other => Err(EngineError::InvalidOptions(format!(
                "unknown trim mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrimOptions {
    #[serde(default)]
    pub mode: TrimMode,
    pub ranges: Vec<Range>,
    #[serde(default)]
    pub encode: EncodeOptions,
}

impl TrimOptions {
    /// Whether the ranges are extracted by seeking and stream copying
    pub fn is_stream_copy(&self) -> bool {
        match self.mode {
            TrimMode::Trim => self.ranges.len() == 1,
            TrimMode::Cut => false,
            TrimMode::Split => true,
        }
    }

    /// Length of the joined output of a re-encoded trim
    pub fn kept_duration(&self) -> f64 {
        self.ranges.iter().map(Range::duration).sum()
    }

    /// A kept-audio concat graph must know whether the source has audio
    pub fn needs_audio_layout(&self) -> bool {
        !self.is_stream_copy() && self.encode.keep_audio
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobOptions {
    Compress(CompressOptions),
    Effects(EffectsOptions),
    Trim(TrimOptions),
}

impl JobOptions {
    pub fn kind(&self) -> JobKind {
        match self {
            JobOptions::Compress(_) => JobKind::Compress,
            JobOptions::Effects(_) => JobKind::Effects,
            JobOptions::Trim(_) => JobKind::Trim,
        }
    }

    /// Reject option records that could never produce a valid invocation
    pub fn validate(&self) -> EngineResult<()> {
        match self {
            JobOptions::Compress(o) => {
                if o.target_size_bytes == Some(0) {
                    return Err(EngineError::InvalidOptions(
                        "target size must be greater than zero".to_string(),
                    ));
                }
                if let Some(fps) = o.max_fps {
                    if !(fps.is_finite() && fps > 0.0) {
                        return Err(EngineError::InvalidOptions(format!(
                            "max fps {} must be positive",
                            fps
                        )));
                    }
                }
                if let Some(rate) = &o.video_bitrate {
                    if rate.trim().is_empty() {
                        return Err(EngineError::InvalidOptions(
                            "video bitrate must not be empty".to_string(),
                        ));
                    }
                }
            }
            JobOptions::Effects(o) => {
                if let Some(speed) = o.speed {
                    if !(speed.is_finite() && speed > 0.0) {
                        return Err(EngineError::InvalidOptions(format!(
                            "speed {} must be a positive number",
                            speed
                        )));
                    }
                }
                if let Some(deg) = o.rotate {
                    if deg % 90 != 0 {
                        return Err(EngineError::InvalidOptions(format!(
                            "rotation {} is not a multiple of 90 degrees",
                            deg
                        )));
                    }
                }
            }
            JobOptions::Trim(o) => {
                if o.ranges.is_empty() {
                    return Err(EngineError::InvalidOptions(
                        "at least one range is required".to_string(),
                    ));
                }
                for range in &o.ranges {
                    range.validate()?;
                }
            }
        }
        Ok(())
    }
}

/// One requested transformation; its lifecycle lives with the runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub source_path: PathBuf,
    pub options: JobOptions,
    /// One entry per output file; split jobs produce one file per range
    pub output_paths: Vec<PathBuf>,
}

impl Job {
    pub fn new(id: Option<JobId>, source_path: PathBuf, options: JobOptions) -> Self {
        Self {
            id: id.unwrap_or_else(Uuid::new_v4),
            source_path,
            options,
            output_paths: Vec::new(),
        }
    }

    pub fn kind(&self) -> JobKind {
        self.options.kind()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_paths.first().map(PathBuf::as_path)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventState {
    Analyzing,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl EventState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EventState::Completed | EventState::Failed | EventState::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub percent: f64,
    pub state: EventState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_output_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_files: Vec<PathBuf>,
}

impl ProgressEvent {
    fn bare(job_id: JobId, state: EventState, percent: f64) -> Self {
        Self {
            job_id,
            percent,
            state,
            speed_multiplier: None,
            current_output_bytes: None,
            eta_seconds: None,
            output_path: None,
            error_message: None,
            exit_code: None,
            output_files: Vec::new(),
        }
    }

    pub fn analyzing(job_id: JobId) -> Self {
        Self::bare(job_id, EventState::Analyzing, 0.0)
    }

    pub fn processing(job_id: JobId, percent: f64) -> Self {
        Self::bare(job_id, EventState::Processing, percent)
    }

    pub fn completed(job_id: JobId, output_bytes: Option<u64>) -> Self {
        let mut event = Self::bare(job_id, EventState::Completed, 100.0);
        event.current_output_bytes = output_bytes;
        event.eta_seconds = Some(0.0);
        event
    }

    pub fn failed(job_id: JobId, percent: f64, message: impl Into<String>) -> Self {
        let mut event = Self::bare(job_id, EventState::Failed, percent);
        event.error_message = Some(message.into());
        event
    }

    pub fn cancelled(job_id: JobId, percent: f64) -> Self {
        Self::bare(job_id, EventState::Cancelled, percent)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
