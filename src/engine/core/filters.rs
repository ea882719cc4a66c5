//! Filter graph composition: effect chains and trim/concat graphs.

use super::types::{EffectsOptions, Range, TrimOptions};

/// Per-stage limits of the `atempo` audio filter
pub const ATEMPO_MIN: f64 = 0.5;
pub const ATEMPO_MAX: f64 = 2.0;

/// Speed factors this close to 1 are treated as unchanged
const SPEED_EPSILON: f64 = 1e-9;

/// Fixed sepia channel-mix matrix (rows: r, g, b)
const SEPIA_MIX: &str =
    "colorchannelmixer=.393:.769:.189:0:.349:.686:.168:0:.272:.534:.131";

/// Video and audio filter lists, emitted as `-vf` and `-af`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectChain {
    pub video: Vec<String>,
    pub audio: Vec<String>,
}

impl EffectChain {
    pub fn video_arg(&self) -> Option<String> {
        (!self.video.is_empty()).then(|| self.video.join(","))
    }

    pub fn audio_arg(&self) -> Option<String> {
        (!self.audio.is_empty()).then(|| self.audio.join(","))
    }
}

/// Render seconds with at most millisecond precision ("5", "2.5", "0.125")
pub fn format_seconds(seconds: f64) -> String {
    format_factor(seconds, 3)
}

fn format_factor(value: f64, decimals: usize) -> String {
    let s = format!("{:.*}", decimals, value);
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// Split a speed factor into `atempo` stages that each stay within
/// [`ATEMPO_MIN`, `ATEMPO_MAX`] and multiply back to `speed`.
///
/// A factor of exactly 1 needs no stage.
pub fn atempo_stages(speed: f64) -> Vec<f64> {
    let mut stages = Vec::new();
    if !(speed.is_finite() && speed > 0.0) {
        return stages;
    }

    let mut remaining = speed;
    while remaining > ATEMPO_MAX {
        stages.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        stages.push(ATEMPO_MIN);
        remaining /= ATEMPO_MIN;
    }
    if (remaining - 1.0).abs() > SPEED_EPSILON {
        stages.push(remaining);
    }
    stages
}

fn rotation_filters(degrees: i32) -> Vec<String> {
    match degrees.rem_euclid(360) {
        90 => vec!["transpose=1".to_string()],
        180 => vec!["transpose=1".to_string(), "transpose=1".to_string()],
        270 => vec!["transpose=2".to_string()],
        _ => Vec::new(),
    }
}

fn color_filter(opts: &EffectsOptions) -> Option<String> {
    let parts: Vec<String> = [
        ("brightness", opts.brightness),
        ("contrast", opts.contrast),
        ("saturation", opts.saturation),
        ("gamma", opts.gamma),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| format!("{}={}", name, format_factor(v, 4))))
    .collect();

    (!parts.is_empty()).then(|| format!("eq={}", parts.join(":")))
}

/// Build the ordered effect chain.
///
/// Timing stages come first (speed) and last (reverse) so every spatial filter
/// sees frames whose timestamps are already final for its position in the
/// chain. Audio stages are only produced when `with_audio` is set.
pub fn build_effect_chain(opts: &EffectsOptions, with_audio: bool) -> EffectChain {
    let mut chain = EffectChain::default();
    let speed = opts.speed_factor();

    if (speed - 1.0).abs() > SPEED_EPSILON {
        chain
            .video
            .push(format!("setpts={}*PTS", format_factor(1.0 / speed, 6)));
        if with_audio {
            chain.audio.extend(
                atempo_stages(speed)
                    .into_iter()
                    .map(|s| format!("atempo={}", format_factor(s, 6))),
            );
        }
    }

    if opts.flip_horizontal {
        chain.video.push("hflip".to_string());
    }
    if opts.flip_vertical {
        chain.video.push("vflip".to_string());
    }
    if let Some(deg) = opts.rotate {
        chain.video.extend(rotation_filters(deg));
    }
    if let Some(eq) = color_filter(opts) {
        chain.video.push(eq);
    }
    if opts.grayscale {
        chain.video.push("hue=s=0".to_string());
    }
    if opts.sepia {
        chain.video.push(SEPIA_MIX.to_string());
    }
    if let Some(sigma) = opts.blur {
        if sigma > 0.0 {
            chain
                .video
                .push(format!("gblur=sigma={}", format_factor(sigma, 3)));
        }
    }
    if let Some(strength) = opts.noise {
        if strength > 0 {
            chain
                .video
                .push(format!("noise=alls={}:allf=t", strength.min(100)));
        }
    }
    if let Some(amount) = opts.sharpen {
        if amount > 0.0 {
            chain
                .video
                .push(format!("unsharp=5:5:{}", format_factor(amount, 3)));
        }
    }
    if opts.vintage {
        chain.video.push("curves=vintage".to_string());
        chain.video.push("vignette=PI/4".to_string());
    }
    if opts.reverse {
        chain.video.push("reverse".to_string());
        if with_audio {
            chain.audio.push("areverse".to_string());
        }
    }

    chain
}

/// Labelled outputs of a concat graph, for `-map`
pub const CONCAT_VIDEO_OUT: &str = "[outv]";
pub const CONCAT_AUDIO_OUT: &str = "[outa]";

/// Trim every range independently, reset its timestamps and concatenate the
/// pieces in order. Audio branches are only built when `with_audio` is set,
/// keeping the concat stream counts matched.
pub fn build_concat_graph(ranges: &[Range], with_audio: bool) -> String {
    let mut parts = Vec::with_capacity(ranges.len() * 2 + 1);
    let mut concat_inputs = String::new();

    for (i, range) in ranges.iter().enumerate() {
        let start = format_seconds(range.start);
        let end = format_seconds(range.end);
        parts.push(format!(
            "[0:v]trim=start={}:end={},setpts=PTS-STARTPTS[v{}]",
            start, end, i
        ));
        concat_inputs.push_str(&format!("[v{}]", i));
        if with_audio {
            parts.push(format!(
                "[0:a]atrim=start={}:end={},asetpts=PTS-STARTPTS[a{}]",
                start, end, i
            ));
            concat_inputs.push_str(&format!("[a{}]", i));
        }
    }

    if with_audio {
        parts.push(format!(
            "{}concat=n={}:v=1:a=1{}{}",
            concat_inputs,
            ranges.len(),
            CONCAT_VIDEO_OUT,
            CONCAT_AUDIO_OUT
        ));
    } else {
        parts.push(format!(
            "{}concat=n={}:v=1:a=0{}",
            concat_inputs,
            ranges.len(),
            CONCAT_VIDEO_OUT
        ));
    }

    parts.join(";")
}

/// How a trim job is carried out
#[derive(Debug, Clone, PartialEq)]
pub enum TrimPlan {
    /// Seek and stream-copy, one output per range
    StreamCopy(Vec<Range>),
    /// Re-encode the ranges joined through a concat graph
    Concat { graph: String, with_audio: bool },
}

pub fn plan_trim(opts: &TrimOptions, with_audio: bool) -> TrimPlan {
    if opts.is_stream_copy() {
        TrimPlan::StreamCopy(opts.ranges.clone())
    } else {
        TrimPlan::Concat {
            graph: build_concat_graph(&opts.ranges, with_audio),
            with_audio,
        }
    }
}
