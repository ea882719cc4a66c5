use super::bitrate::compute_target_bitrate;
use super::error::{EngineError, EngineResult};
use super::filters::{
    CONCAT_AUDIO_OUT, CONCAT_VIDEO_OUT, TrimPlan, build_effect_chain, format_seconds, plan_trim,
};
use super::types::{
    CompressOptions, EffectsOptions, EncodeOptions, Job, JobOptions, TrimMode, TrimOptions,
};
use crate::engine::hardware::{self, Platform, RateControl};
use crate::engine::probe::MediaMetadata;
use std::path::{Path, PathBuf};

/// Audio bitrate for re-encoded tracks
const AUDIO_BITRATE: &str = "128k";

/// One transcoder process worth of work
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub args: Vec<String>,
    pub output_path: PathBuf,
    /// Length of the produced media, the denominator for progress percent
    pub expected_duration: Option<f64>,
}

/// Host-level inputs to command construction
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSettings {
    pub threads: Option<u32>,
    pub platform: Platform,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            threads: None,
            platform: Platform::current(),
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn push<I, S>(args: &mut Vec<String>, items: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.extend(items.into_iter().map(Into::into));
}

fn global_args(settings: &BuildSettings) -> Vec<String> {
    let mut args = vec!["-hide_banner".to_string(), "-nostdin".to_string()];
    if let Some(threads) = settings.threads {
        push(&mut args, ["-threads".to_string(), threads.to_string()]);
    }
    args
}

fn container_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// `-an`, or the audio encoder matching the output container
fn audio_args(with_audio: bool, container: &str) -> Vec<String> {
    if !with_audio {
        return vec!["-an".to_string()];
    }
    // WebM cannot carry AAC
    let codec = if container == "webm" { "libopus" } else { "aac" };
    vec![
        "-c:a".to_string(),
        codec.to_string(),
        "-b:a".to_string(),
        AUDIO_BITRATE.to_string(),
    ]
}

/// Encoder, quality knob, preset and pixel format, in that order
fn video_encode_args(encode: &EncodeOptions, rate: RateControl, settings: &BuildSettings) -> Vec<String> {
    let mut choice = hardware::select(encode.codec, encode.hardware_acceleration, settings.platform);
    if matches!(rate, RateControl::Bitrate(_)) {
        choice = choice.with_bitrate();
    }

    let mut args = hardware::quality_args(&choice, &rate);
    args.extend(hardware::preset_args(&choice, encode.preset.as_deref()));
    args.extend(hardware::pixel_format_args(&choice));
    args
}

fn finish_args(args: &mut Vec<String>, output: &Path) {
    args.push(path_arg(output));
    args.push("-y".to_string());
}

/// Cap dimensions and frame rate without ever upscaling
fn compress_filters(opts: &CompressOptions, meta: &MediaMetadata) -> Vec<String> {
    let mut filters = Vec::new();

    if opts.max_width.is_some() || opts.max_height.is_some() {
        let w = opts
            .max_width
            .map_or("iw".to_string(), |w| format!("min({},iw)", w));
        let h = opts
            .max_height
            .map_or("ih".to_string(), |h| format!("min({},ih)", h));
        filters.push(format!(
            "scale='{}':'{}':force_original_aspect_ratio=decrease",
            w, h
        ));
    }

    if let Some(max_fps) = opts.max_fps {
        if meta.frame_rate > max_fps {
            filters.push(format!("fps=fps={}", format_seconds(max_fps)));
        }
    }

    filters
}

fn build_compress(
    source: &Path,
    output: &Path,
    opts: &CompressOptions,
    meta: &MediaMetadata,
    settings: &BuildSettings,
) -> EngineResult<Invocation> {
    let rate = if let Some(target) = opts.target_size_bytes {
        RateControl::Bitrate(compute_target_bitrate(
            target,
            meta.duration_seconds,
            opts.encode.keep_audio,
        )?)
    } else if let Some(bitrate) = &opts.video_bitrate {
        RateControl::Bitrate(bitrate.trim().to_string())
    } else {
        RateControl::Crf(opts.encode.effective_crf())
    };

    let mut args = global_args(settings);
    push(&mut args, ["-i".to_string(), path_arg(source)]);

    let filters = compress_filters(opts, meta);
    if !filters.is_empty() {
        push(&mut args, ["-vf".to_string(), filters.join(",")]);
    }

    args.extend(video_encode_args(&opts.encode, rate, settings));
    args.extend(audio_args(opts.encode.keep_audio, &container_of(output)));
    finish_args(&mut args, output);

    Ok(Invocation {
        args,
        output_path: output.to_path_buf(),
        expected_duration: meta.known_duration(),
    })
}

fn build_effects(
    source: &Path,
    output: &Path,
    opts: &EffectsOptions,
    meta: &MediaMetadata,
    settings: &BuildSettings,
) -> Invocation {
    // Unknown audio still gets its filters so a re-encoded track stays in sync
    let with_audio = opts.encode.keep_audio && meta.has_audio != Some(false);
    let chain = build_effect_chain(opts, with_audio);

    let mut args = global_args(settings);
    push(&mut args, ["-i".to_string(), path_arg(source)]);
    if let Some(vf) = chain.video_arg() {
        push(&mut args, ["-vf".to_string(), vf]);
    }
    if let Some(af) = chain.audio_arg() {
        push(&mut args, ["-af".to_string(), af]);
    }

    args.extend(video_encode_args(
        &opts.encode,
        RateControl::Crf(opts.encode.effective_crf()),
        settings,
    ));
    args.extend(audio_args(opts.encode.keep_audio, &container_of(output)));
    finish_args(&mut args, output);

    Invocation {
        args,
        output_path: output.to_path_buf(),
        expected_duration: meta.known_duration().map(|d| d / opts.speed_factor()),
    }
}

fn build_trim(
    source: &Path,
    outputs: &[PathBuf],
    opts: &TrimOptions,
    meta: &MediaMetadata,
    settings: &BuildSettings,
) -> EngineResult<Vec<Invocation>> {
    if opts.needs_audio_layout() && meta.has_audio.is_none() {
        return Err(EngineError::InvalidOptions(
            "cannot join ranges: source audio layout is unknown (use --no-audio to drop it)"
                .to_string(),
        ));
    }
    let with_audio = opts.encode.keep_audio && meta.has_audio == Some(true);

    match plan_trim(opts, with_audio) {
        TrimPlan::StreamCopy(ranges) => {
            if outputs.len() != ranges.len() {
                return Err(EngineError::InvalidOptions(format!(
                    "{} output paths for {} ranges",
                    outputs.len(),
                    ranges.len()
                )));
            }
            Ok(ranges
                .iter()
                .zip(outputs)
                .map(|(range, output)| {
                    let mut args = global_args(settings);
                    push(
                        &mut args,
                        [
                            "-ss".to_string(),
                            format_seconds(range.start),
                            "-i".to_string(),
                            path_arg(source),
                            "-t".to_string(),
                            format_seconds(range.duration()),
                            "-c".to_string(),
                            "copy".to_string(),
                        ],
                    );
                    if !opts.encode.keep_audio {
                        args.push("-an".to_string());
                    }
                    finish_args(&mut args, output);
                    Invocation {
                        args,
                        output_path: output.clone(),
                        expected_duration: Some(range.duration()),
                    }
                })
                .collect())
        }
        TrimPlan::Concat { graph, with_audio } => {
            let output = outputs.first().ok_or_else(|| {
                EngineError::InvalidOptions("no output path for trim job".to_string())
            })?;

            let mut args = global_args(settings);
            push(
                &mut args,
                [
                    "-i".to_string(),
                    path_arg(source),
                    "-filter_complex".to_string(),
                    graph,
                    "-map".to_string(),
                    CONCAT_VIDEO_OUT.to_string(),
                ],
            );
            if with_audio {
                push(&mut args, ["-map", CONCAT_AUDIO_OUT]);
            }
            args.extend(video_encode_args(
                &opts.encode,
                RateControl::Crf(opts.encode.effective_crf()),
                settings,
            ));
            args.extend(audio_args(with_audio, &container_of(output)));
            finish_args(&mut args, output);

            Ok(vec![Invocation {
                args,
                output_path: output.clone(),
                expected_duration: Some(opts.kept_duration()),
            }])
        }
    }
}

/// Build every invocation a job needs, in execution order.
///
/// Requires `job.output_paths` to be resolved (see [`resolve_output_paths`]).
/// Deterministic: the same job, metadata and settings give the same vectors.
pub fn build_invocations(
    job: &Job,
    meta: &MediaMetadata,
    settings: &BuildSettings,
) -> EngineResult<Vec<Invocation>> {
    let output = || {
        job.output_path().ok_or_else(|| {
            EngineError::InvalidOptions(format!("job {} has no output path", job.id))
        })
    };

    match &job.options {
        JobOptions::Compress(opts) => {
            Ok(vec![build_compress(&job.source_path, output()?, opts, meta, settings)?])
        }
        JobOptions::Effects(opts) => Ok(vec![build_effects(
            &job.source_path,
            output()?,
            opts,
            meta,
            settings,
        )]),
        JobOptions::Trim(opts) => build_trim(&job.source_path, &job.output_paths, opts, meta, settings),
    }
}

/// Output container extension for a job
pub fn output_container(source: &Path, options: &JobOptions) -> String {
    match options {
        JobOptions::Compress(opts) => opts
            .container
            .as_deref()
            .map(|c| c.trim_start_matches('.').to_ascii_lowercase())
            .unwrap_or_else(|| opts.encode.codec.default_container().to_string()),
        JobOptions::Effects(opts) => opts.encode.codec.default_container().to_string(),
        JobOptions::Trim(opts) if opts.is_stream_copy() => {
            let ext = container_of(source);
            if ext.is_empty() { "mp4".to_string() } else { ext }
        }
        JobOptions::Trim(opts) => opts.encode.codec.default_container().to_string(),
    }
}

fn output_label(options: &JobOptions) -> &'static str {
    match options {
        JobOptions::Compress(_) => "compressed",
        JobOptions::Effects(_) => "effects",
        JobOptions::Trim(opts) => match opts.mode {
            TrimMode::Trim => "trimmed",
            TrimMode::Cut => "cut",
            TrimMode::Split => "split",
        },
    }
}

/// `<dir>/<stem>_<label>_<stamp>.<ext>`
pub fn generated_output_path(source: &Path, options: &JobOptions, dir: &Path, stamp: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    dir.join(format!(
        "{}_{}_{}.{}",
        stem,
        output_label(options),
        stamp,
        output_container(source, options)
    ))
}

/// `<stem>_part<N>.<ext>` next to `base`, counting from 1
pub fn split_part_path(base: &Path, index: usize) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let name = match base.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_part{}.{}", stem, index + 1, ext),
        None => format!("{}_part{}", stem, index + 1),
    };
    base.with_file_name(name)
}

/// Output files for a job: the explicit path or a generated name in
/// `default_dir`; split jobs get one numbered file per range.
pub fn resolve_output_paths(
    source: &Path,
    options: &JobOptions,
    explicit: Option<&Path>,
    default_dir: &Path,
    stamp: &str,
) -> Vec<PathBuf> {
    let base = match explicit {
        Some(path) => path.to_path_buf(),
        None => generated_output_path(source, options, default_dir, stamp),
    };

    match options {
        JobOptions::Trim(opts) if opts.mode == TrimMode::Split => (0..opts.ranges.len())
            .map(|i| split_part_path(&base, i))
            .collect(),
        _ => vec![base],
    }
}

/// Format an invocation as a shell-safe command line for display
pub fn format_invocation(program: &Path, invocation: &Invocation) -> String {
    let program = path_arg(program);
    let words = std::iter::once(program.as_str()).chain(invocation.args.iter().map(String::as_str));
    shlex::try_join(words.clone()).unwrap_or_else(|_| words.collect::<Vec<_>>().join(" "))
}
