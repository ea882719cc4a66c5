use clap::{Args, Parser, Subcommand};
use ffjob::engine::{Range, TrimMode, VideoCodec};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ffjob")]
#[command(about = "Compress, apply effects to, and trim videos through ffmpeg", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Transcoder executable (overrides config and PATH lookup)
    #[arg(long, global = true, value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Options shared by every command that runs a job
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Output file (defaults to a generated name in the output directory)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print the transcoder invocations without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Print progress events as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Encoder overrides on top of the configured defaults
#[derive(Args, Debug, Clone)]
pub struct EncodeArgs {
    /// Video codec: h264, hevc, vp9, av1
    #[arg(long, value_parser = parse_codec)]
    pub codec: Option<VideoCodec>,

    /// Constant rate factor
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=63))]
    pub crf: Option<u32>,

    /// Encoder speed preset (ultrafast..veryslow)
    #[arg(long)]
    pub preset: Option<String>,

    /// Use the platform's hardware encoder when one exists
    #[arg(long)]
    pub hw: bool,

    /// Drop the audio track
    #[arg(long)]
    pub no_audio: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the transcoder can be found and runs
    CheckFfmpeg,

    /// Print duration, resolution, codec and frame rate of a file
    Probe {
        file: PathBuf,

        /// Print the metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-encode a video at a CRF, bitrate or target size
    Compress {
        file: PathBuf,

        /// Target output size, e.g. 10MB, 700k, 1.5G
        #[arg(long, value_parser = parse_size, conflicts_with = "bitrate")]
        target_size: Option<u64>,

        /// Explicit video bitrate, e.g. 2500k
        #[arg(long)]
        bitrate: Option<String>,

        #[arg(long)]
        max_width: Option<u32>,

        #[arg(long)]
        max_height: Option<u32>,

        #[arg(long)]
        max_fps: Option<f64>,

        /// Output container extension (mp4, mkv, webm, ...)
        #[arg(long)]
        container: Option<String>,

        #[command(flatten)]
        encode: EncodeArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Apply visual and audio effects
    Effects {
        file: PathBuf,

        /// Playback speed factor (0.25 = quarter speed, 4 = four times faster)
        #[arg(long)]
        speed: Option<f64>,

        #[arg(long)]
        hflip: bool,

        #[arg(long)]
        vflip: bool,

        /// Clockwise rotation in degrees (multiple of 90)
        #[arg(long, allow_hyphen_values = true)]
        rotate: Option<i32>,

        #[arg(long, allow_hyphen_values = true)]
        brightness: Option<f64>,

        #[arg(long)]
        contrast: Option<f64>,

        #[arg(long)]
        saturation: Option<f64>,

        #[arg(long)]
        gamma: Option<f64>,

        #[arg(long)]
        grayscale: bool,

        #[arg(long)]
        sepia: bool,

        /// Gaussian blur sigma
        #[arg(long)]
        blur: Option<f64>,

        /// Noise strength (0-100)
        #[arg(long)]
        noise: Option<u32>,

        /// Unsharp amount
        #[arg(long)]
        sharpen: Option<f64>,

        #[arg(long)]
        vintage: bool,

        /// Play video and audio backwards
        #[arg(long)]
        reverse: bool,

        #[command(flatten)]
        encode: EncodeArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Keep, join or split time ranges
    Trim {
        file: PathBuf,

        /// trim (keep ranges), cut (join ranges, re-encoded), split (one file per range)
        #[arg(long, default_value = "trim", value_parser = parse_mode)]
        mode: TrimMode,

        /// Time range START-END in seconds or [HH:]MM:SS, repeatable
        #[arg(long = "range", value_parser = parse_range, required = true)]
        ranges: Vec<Range>,

        #[command(flatten)]
        encode: EncodeArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Show config status and location, or create default config if missing
    InitConfig,
}

fn parse_codec(s: &str) -> Result<VideoCodec, String> {
    s.parse().map_err(|e: ffjob::engine::EngineError| e.to_string())
}

fn parse_mode(s: &str) -> Result<TrimMode, String> {
    s.parse().map_err(|e: ffjob::engine::EngineError| e.to_string())
}

/// Seconds, `MM:SS` or `HH:MM:SS`, with optional fraction
pub fn parse_timestamp(s: &str) -> Result<f64, String> {
    let mut seconds = 0.0;
    for part in s.trim().split(':') {
        let value: f64 = part
            .parse()
            .map_err(|_| format!("invalid timestamp '{}'", s))?;
        if value < 0.0 {
            return Err(format!("invalid timestamp '{}'", s));
        }
        seconds = seconds * 60.0 + value;
    }
    Ok(seconds)
}

pub fn parse_range(s: &str) -> Result<Range, String> {
    let (start, end) = s
        .split_once('-')
        .ok_or_else(|| format!("range '{}' must look like START-END", s))?;
    let range = Range::new(parse_timestamp(start)?, parse_timestamp(end)?);
    if range.end <= range.start {
        return Err(format!("range '{}' ends before it starts", s));
    }
    Ok(range)
}

/// Byte count with an optional k/M/G suffix (binary multiples, `B` optional)
pub fn parse_size(s: &str) -> Result<u64, String> {
    let trimmed = s.trim();
    let upper = trimmed.to_ascii_uppercase();
    let number = upper.trim_end_matches('B').trim_end_matches("I");
    let (digits, mult) = match number.chars().last() {
        Some('K') => (&number[..number.len() - 1], 1024.0),
        Some('M') => (&number[..number.len() - 1], 1024.0 * 1024.0),
        Some('G') => (&number[..number.len() - 1], 1024.0 * 1024.0 * 1024.0),
        _ => (number, 1.0),
    };
    let value: f64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid size '{}'", trimmed))?;
    if !(value.is_finite() && value > 0.0) {
        return Err(format!("size '{}' must be positive", trimmed));
    }
    Ok((value * mult).round() as u64)
}

pub fn parse() -> Cli {
    Cli::parse()
}
