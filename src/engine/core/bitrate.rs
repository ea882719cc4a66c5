//! Target-size bitrate solver.

use super::error::{EngineError, EngineResult};

/// Bits per second reserved for the AAC track when audio is kept
pub const AUDIO_ALLOWANCE_BPS: f64 = 128_000.0;

/// Lowest video bitrate ever requested, in kbps
pub const MIN_VIDEO_KBPS: u64 = 100;

/// Video bitrate in kbps that makes `duration_s` seconds of output land near
/// `target_bytes`, after reserving the audio allowance.
pub fn target_video_kbps(target_bytes: u64, duration_s: f64, keep_audio: bool) -> EngineResult<u64> {
    if !(duration_s.is_finite() && duration_s > 0.0) {
        return Err(EngineError::InvalidDuration(duration_s));
    }

    let audio_bits = if keep_audio {
        AUDIO_ALLOWANCE_BPS * duration_s
    } else {
        0.0
    };
    let video_bits = target_bytes as f64 * 8.0 - audio_bits;
    let kbps = (video_bits / duration_s / 1000.0).floor();

    // Negative budgets (audio alone exceeds the target) land on the floor too
    if kbps < MIN_VIDEO_KBPS as f64 {
        Ok(MIN_VIDEO_KBPS)
    } else {
        Ok(kbps as u64)
    }
}

/// Same as [`target_video_kbps`], formatted for `-b:v` (e.g. "710k")
pub fn compute_target_bitrate(
    target_bytes: u64,
    duration_s: f64,
    keep_audio: bool,
) -> EngineResult<String> {
    target_video_kbps(target_bytes, duration_s, keep_audio).map(|kbps| format!("{}k", kbps))
}
