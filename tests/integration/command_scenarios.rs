// Invocations built for representative jobs

use crate::common::assertions::*;
use crate::common::helpers::*;
use ffjob::engine::{
    CompressOptions, EffectsOptions, EncodeOptions, EngineError, JobOptions, Range, TrimMode,
    TrimOptions, VideoCodec, build_invocations,
};

fn trim(mode: TrimMode, ranges: &[(f64, f64)]) -> JobOptions {
    JobOptions::Trim(TrimOptions {
        mode,
        ranges: ranges.iter().map(|&(s, e)| Range::new(s, e)).collect(),
        encode: EncodeOptions::default(),
    })
}

#[test]
fn test_single_range_trim_is_one_stream_copy() {
    let invocations = plan(trim(TrimMode::Trim, &[(5.0, 15.0)]), &fixture_meta(30.0, true));

    assert_eq!(invocations.len(), 1);
    assert_eq!(
        cmd_line(&invocations[0]),
        "-hide_banner -nostdin -ss 5 -i /media/in.mp4 -t 10 -c copy \
         /out/in_trimmed_20260101-000000.mp4 -y"
    );
    assert_eq!(invocations[0].expected_duration, Some(10.0));
}

#[test]
fn test_cut_joins_ranges_with_concat_graph() {
    let invocations = plan(
        trim(TrimMode::Cut, &[(0.0, 5.0), (20.0, 25.0)]),
        &fixture_meta(30.0, true),
    );

    assert_eq!(invocations.len(), 1);
    let args = &invocations[0].args;
    assert_eq!(
        flag_value(args, "-filter_complex"),
        Some(
            "[0:v]trim=start=0:end=5,setpts=PTS-STARTPTS[v0];\
             [0:a]atrim=start=0:end=5,asetpts=PTS-STARTPTS[a0];\
             [0:v]trim=start=20:end=25,setpts=PTS-STARTPTS[v1];\
             [0:a]atrim=start=20:end=25,asetpts=PTS-STARTPTS[a1];\
             [v0][a0][v1][a1]concat=n=2:v=1:a=1[outv][outa]"
        )
    );

    let cmd = cmd_line(&invocations[0]);
    assert_cmd_contains(&cmd, "-map [outv] -map [outa]");
    assert_cmd_contains(&cmd, "-c:v libx264 -crf 23 -preset medium -pix_fmt yuv420p");
    assert_cmd_contains(&cmd, "-c:a aac -b:a 128k /out/in_cut_20260101-000000.mp4 -y");
    assert_cmd_not_contains(&cmd, "-c copy");
    assert_eq!(invocations[0].expected_duration, Some(10.0));
}

#[test]
fn test_cut_of_silent_source_drops_audio_branches() {
    let invocations = plan(
        trim(TrimMode::Cut, &[(0.0, 5.0), (20.0, 25.0)]),
        &fixture_meta(30.0, false),
    );

    let args = &invocations[0].args;
    let graph = flag_value(args, "-filter_complex").expect("missing filter graph");
    assert!(!graph.contains("atrim"));
    assert!(graph.ends_with("[v0][v1]concat=n=2:v=1:a=0[outv]"));

    let cmd = cmd_line(&invocations[0]);
    assert_cmd_not_contains(&cmd, "[outa]");
    assert_cmd_contains(&cmd, "-an");
}

#[test]
fn test_multi_range_trim_is_re_encoded() {
    let invocations = plan(
        trim(TrimMode::Trim, &[(1.0, 2.0), (3.0, 4.5)]),
        &fixture_meta(30.0, true),
    );

    assert_eq!(invocations.len(), 1);
    assert!(flag_value(&invocations[0].args, "-filter_complex").is_some());
    assert_eq!(invocations[0].expected_duration, Some(2.5));
}

#[test]
fn test_split_makes_one_copy_per_range() {
    let invocations = plan(
        trim(TrimMode::Split, &[(0.0, 10.0), (10.0, 20.0)]),
        &fixture_meta(30.0, true),
    );

    let lines: Vec<String> = invocations.iter().map(cmd_line).collect();
    assert_eq!(
        lines,
        [
            "-hide_banner -nostdin -ss 0 -i /media/in.mp4 -t 10 -c copy \
             /out/in_split_20260101-000000_part1.mp4 -y",
            "-hide_banner -nostdin -ss 10 -i /media/in.mp4 -t 10 -c copy \
             /out/in_split_20260101-000000_part2.mp4 -y",
        ]
    );
}

#[test]
fn test_target_size_sets_video_bitrate() {
    let options = JobOptions::Compress(CompressOptions {
        target_size_bytes: Some(10 * 1024 * 1024),
        ..Default::default()
    });
    let invocations = plan(options, &fixture_meta(100.0, true));

    let cmd = cmd_line(&invocations[0]);
    assert_cmd_has_flag_value(&cmd, "-b:v", "710k");
    assert_cmd_not_contains(&cmd, "-crf");
    assert_cmd_contains(&cmd, "-c:a aac -b:a 128k");
}

#[test]
fn test_target_size_without_duration_is_rejected() {
    let options = JobOptions::Compress(CompressOptions {
        target_size_bytes: Some(10 * 1024 * 1024),
        ..Default::default()
    });
    let job = planned_job(options);
    let err = build_invocations(&job, &fixture_meta(0.0, true), &fixed_settings()).unwrap_err();
    assert!(matches!(err, EngineError::InvalidDuration(_)), "{:?}", err);
}

#[test]
fn test_compress_caps_never_upscale() {
    let options = JobOptions::Compress(CompressOptions {
        max_width: Some(1280),
        max_fps: Some(60.0),
        ..Default::default()
    });
    let invocations = plan(options, &fixture_meta(30.0, true));

    let vf = flag_value(&invocations[0].args, "-vf").expect("missing -vf");
    assert!(vf.contains("min(1280,iw)"), "{}", vf);
    // 30 fps source is already under the cap
    assert!(!vf.contains("fps="), "{}", vf);
}

#[test]
fn test_effects_speed_scales_video_and_audio() {
    let options = JobOptions::Effects(EffectsOptions {
        speed: Some(2.0),
        flip_horizontal: true,
        ..Default::default()
    });
    let invocations = plan(options, &fixture_meta(30.0, true));

    let args = &invocations[0].args;
    assert_eq!(flag_value(args, "-vf"), Some("setpts=0.5*PTS,hflip"));
    assert_eq!(flag_value(args, "-af"), Some("atempo=2"));
    assert_eq!(invocations[0].expected_duration, Some(15.0));
}

#[test]
fn test_effects_vp9_goes_to_webm_with_opus() {
    let options = JobOptions::Effects(EffectsOptions {
        encode: EncodeOptions {
            codec: VideoCodec::Vp9,
            ..Default::default()
        },
        grayscale: true,
        ..Default::default()
    });
    let invocations = plan(options, &fixture_meta(30.0, true));

    let cmd = cmd_line(&invocations[0]);
    assert_cmd_contains(&cmd, "-c:v libvpx-vp9 -crf 30 -b:v 0");
    assert_cmd_contains(&cmd, "-c:a libopus");
    assert!(invocations[0].output_path.to_string_lossy().ends_with(".webm"));
}
