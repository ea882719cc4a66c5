//! Encoder selection matrix.
//!
//! Maps (codec, hardware flag, host platform) to a concrete FFmpeg encoder and
//! the quality knob it understands. Platform only matters when hardware
//! acceleration is requested; VP9 and AV1 always use software encoders.

use crate::engine::core::VideoCodec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Mac,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Mac
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoEncoder {
    Libx264,
    H264Videotoolbox,
    H264Nvenc,
    Libx265,
    HevcVideotoolbox,
    HevcNvenc,
    LibvpxVp9,
    LibsvtAv1,
}

impl VideoEncoder {
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            VideoEncoder::Libx264 => "libx264",
            VideoEncoder::H264Videotoolbox => "h264_videotoolbox",
            VideoEncoder::H264Nvenc => "h264_nvenc",
            VideoEncoder::Libx265 => "libx265",
            VideoEncoder::HevcVideotoolbox => "hevc_videotoolbox",
            VideoEncoder::HevcNvenc => "hevc_nvenc",
            VideoEncoder::LibvpxVp9 => "libvpx-vp9",
            VideoEncoder::LibsvtAv1 => "libsvtav1",
        }
    }
}

/// Which quality knob an encoder is driven by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMode {
    /// Constant rate factor (`-crf`)
    Crf,
    /// Constant quantizer (`-qp`, nvenc style)
    Quantizer,
    /// 0-100 quality score (`-q:v`, videotoolbox style)
    ProprietaryQuantizer,
    /// Explicit bitrate (`-b:v`)
    Bitrate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncoderChoice {
    pub encoder: VideoEncoder,
    pub quality_mode: QualityMode,
    pub pixel_format_required: bool,
}

impl EncoderChoice {
    fn new(encoder: VideoEncoder, quality_mode: QualityMode) -> Self {
        Self {
            encoder,
            quality_mode,
            pixel_format_required: quality_mode != QualityMode::ProprietaryQuantizer,
        }
    }

    pub fn encoder_id(&self) -> &'static str {
        self.encoder.ffmpeg_name()
    }

    /// The same encoder driven by bitrate instead of its native knob
    pub fn with_bitrate(self) -> Self {
        Self {
            quality_mode: QualityMode::Bitrate,
            ..self
        }
    }
}

/// Rate control requested by a job after target-size solving
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateControl {
    Crf(u32),
    Bitrate(String),
}

pub fn select(codec: VideoCodec, use_hardware: bool, platform: Platform) -> EncoderChoice {
    use QualityMode::*;
    use VideoEncoder::*;

    match (codec, use_hardware, platform) {
        (VideoCodec::H264, true, Platform::Mac) => {
            EncoderChoice::new(H264Videotoolbox, ProprietaryQuantizer)
        }
        (VideoCodec::H264, true, Platform::Windows) => EncoderChoice::new(H264Nvenc, Quantizer),
        (VideoCodec::H264, _, _) => EncoderChoice::new(Libx264, Crf),
        (VideoCodec::Hevc, true, Platform::Mac) => {
            EncoderChoice::new(HevcVideotoolbox, ProprietaryQuantizer)
        }
        (VideoCodec::Hevc, true, Platform::Windows) => EncoderChoice::new(HevcNvenc, Quantizer),
        (VideoCodec::Hevc, _, _) => EncoderChoice::new(Libx265, Crf),
        (VideoCodec::Vp9, _, _) => EncoderChoice::new(LibvpxVp9, Crf),
        (VideoCodec::Av1, _, _) => EncoderChoice::new(LibsvtAv1, Crf),
    }
}

/// Map a 0-51 CRF onto videotoolbox's 0-100 quality score.
///
/// Tuning constant carried over as-is: `round(clamp(100 - crf * 1.5, 0, 100))`.
pub fn videotoolbox_quality(crf: u32) -> u32 {
    (100.0 - crf as f64 * 1.5).clamp(0.0, 100.0).round() as u32
}

/// SVT-AV1 preset for an x264-style preset name (tuning constant: veryslow -> 3, else 5)
pub fn svt_av1_preset(preset: Option<&str>) -> u8 {
    match preset {
        Some("veryslow") => 3,
        _ => 5,
    }
}

/// `-c:v` plus the quality knob arguments for `choice`
pub fn quality_args(choice: &EncoderChoice, rate: &RateControl) -> Vec<String> {
    let mut args = vec!["-c:v".to_string(), choice.encoder_id().to_string()];

    match rate {
        RateControl::Bitrate(bitrate) => {
            args.extend(["-b:v".to_string(), bitrate.clone()]);
        }
        RateControl::Crf(crf) => match choice.quality_mode {
            QualityMode::Crf | QualityMode::Bitrate => {
                args.extend(["-crf".to_string(), crf.to_string()]);
                if choice.encoder == VideoEncoder::LibvpxVp9 {
                    // libvpx only honours CRF as constant quality with a zero bitrate
                    args.extend(["-b:v".to_string(), "0".to_string()]);
                }
            }
            QualityMode::Quantizer => {
                args.extend([
                    "-rc".to_string(),
                    "constqp".to_string(),
                    "-qp".to_string(),
                    crf.to_string(),
                ]);
            }
            QualityMode::ProprietaryQuantizer => {
                args.extend(["-q:v".to_string(), videotoolbox_quality(*crf).to_string()]);
            }
        },
    }

    args
}

/// Encoder speed preset arguments
pub fn preset_args(choice: &EncoderChoice, preset: Option<&str>) -> Vec<String> {
    match choice.encoder {
        VideoEncoder::Libx264 | VideoEncoder::Libx265 => vec![
            "-preset".to_string(),
            preset.unwrap_or("medium").to_string(),
        ],
        VideoEncoder::LibsvtAv1 => vec!["-preset".to_string(), svt_av1_preset(preset).to_string()],
        VideoEncoder::H264Nvenc | VideoEncoder::HevcNvenc => {
            vec!["-preset".to_string(), "fast".to_string()]
        }
        VideoEncoder::H264Videotoolbox | VideoEncoder::HevcVideotoolbox | VideoEncoder::LibvpxVp9 => {
            Vec::new()
        }
    }
}

pub fn pixel_format_args(choice: &EncoderChoice) -> Vec<String> {
    if choice.pixel_format_required {
        vec!["-pix_fmt".to_string(), "yuv420p".to_string()]
    } else {
        Vec::new()
    }
}
