// Output path resolution and display formatting

use crate::common::helpers::*;
use ffjob::engine::{
    CompressOptions, EffectsOptions, EncodeOptions, JobOptions, Range, TrimMode, TrimOptions,
    VideoCodec, format_invocation, output_container, resolve_output_paths,
};
use std::path::{Path, PathBuf};

fn trim(mode: TrimMode, n: usize) -> JobOptions {
    JobOptions::Trim(TrimOptions {
        mode,
        ranges: (0..n)
            .map(|i| Range::new(i as f64 * 10.0, i as f64 * 10.0 + 5.0))
            .collect(),
        encode: EncodeOptions::default(),
    })
}

#[test]
fn test_generated_names_per_kind() {
    let source = Path::new("/videos/My Clip.mkv");
    let dir = Path::new("/exports");
    let name = |options: &JobOptions| {
        resolve_output_paths(source, options, None, dir, STAMP)
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
    };

    assert_eq!(
        name(&JobOptions::Compress(CompressOptions::default())),
        ["/exports/My Clip_compressed_20260101-000000.mp4"]
    );
    assert_eq!(
        name(&JobOptions::Effects(EffectsOptions::default())),
        ["/exports/My Clip_effects_20260101-000000.mp4"]
    );
    // Stream copies keep the source container
    assert_eq!(
        name(&trim(TrimMode::Trim, 1)),
        ["/exports/My Clip_trimmed_20260101-000000.mkv"]
    );
    assert_eq!(
        name(&trim(TrimMode::Cut, 2)),
        ["/exports/My Clip_cut_20260101-000000.mp4"]
    );
    assert_eq!(
        name(&trim(TrimMode::Split, 3)),
        [
            "/exports/My Clip_split_20260101-000000_part1.mkv",
            "/exports/My Clip_split_20260101-000000_part2.mkv",
            "/exports/My Clip_split_20260101-000000_part3.mkv",
        ]
    );
}

#[test]
fn test_explicit_output_is_used_as_given() {
    let source = Path::new("/videos/in.mp4");
    let explicit = Path::new("/tmp/result.mov");

    let paths = resolve_output_paths(
        source,
        &JobOptions::Compress(CompressOptions::default()),
        Some(explicit),
        Path::new("/unused"),
        STAMP,
    );
    assert_eq!(paths, [PathBuf::from("/tmp/result.mov")]);

    let parts = resolve_output_paths(source, &trim(TrimMode::Split, 2), Some(explicit), Path::new("/unused"), STAMP);
    assert_eq!(
        parts,
        [
            PathBuf::from("/tmp/result_part1.mov"),
            PathBuf::from("/tmp/result_part2.mov"),
        ]
    );
}

#[test]
fn test_container_override_and_codec_defaults() {
    let source = Path::new("in.mp4");
    let compress = |codec, container: Option<&str>| {
        JobOptions::Compress(CompressOptions {
            encode: EncodeOptions {
                codec,
                ..Default::default()
            },
            container: container.map(str::to_string),
            ..Default::default()
        })
    };

    assert_eq!(output_container(source, &compress(VideoCodec::H264, None)), "mp4");
    assert_eq!(output_container(source, &compress(VideoCodec::Vp9, None)), "webm");
    assert_eq!(output_container(source, &compress(VideoCodec::Av1, Some(".MKV"))), "mkv");
}

#[test]
fn test_display_command_survives_shell_split() {
    let invocations = plan(
        JobOptions::Trim(TrimOptions {
            mode: TrimMode::Cut,
            ranges: vec![Range::new(0.0, 5.0), Range::new(20.0, 25.0)],
            encode: EncodeOptions::default(),
        }),
        &fixture_meta(30.0, true),
    );
    let program = Path::new("/opt/ffmpeg dist/bin/ffmpeg");

    let line = format_invocation(program, &invocations[0]);
    let words = shlex::split(&line).expect("display line is not shell-parsable");

    assert_eq!(words[0], "/opt/ffmpeg dist/bin/ffmpeg");
    assert_eq!(&words[1..], invocations[0].args.as_slice());
}
