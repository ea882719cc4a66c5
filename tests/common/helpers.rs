#![allow(dead_code)] // Shared between integration modules; not every binary uses every helper

use ffjob::engine::probe::MediaMetadata;
use ffjob::engine::{
    BuildSettings, EngineSettings, Invocation, Job, JobOptions, JobRunner, JobTicket, Platform,
    ProgressEvent, build_invocations, resolve_output_paths,
};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

pub const STAMP: &str = "20260101-000000";

/// Metadata of a 1080p30 h264 source
pub fn fixture_meta(duration: f64, has_audio: bool) -> MediaMetadata {
    MediaMetadata {
        duration_seconds: duration,
        width: 1920,
        height: 1080,
        codec_name: "h264".to_string(),
        frame_rate: 30.0,
        file_size_bytes: 20_000_000,
        bitrate_kbps: Some(2500.0),
        has_audio: Some(has_audio),
    }
}

pub fn fixed_settings() -> BuildSettings {
    BuildSettings {
        threads: None,
        platform: Platform::Other,
    }
}

/// Job for `/media/in.mp4` with generated outputs under `/out`
pub fn planned_job(options: JobOptions) -> Job {
    let source = PathBuf::from("/media/in.mp4");
    let mut job = Job::new(None, source.clone(), options);
    job.output_paths = resolve_output_paths(&source, &job.options, None, Path::new("/out"), STAMP);
    job
}

pub fn plan(options: JobOptions, meta: &MediaMetadata) -> Vec<Invocation> {
    build_invocations(&planned_job(options), meta, &fixed_settings())
        .expect("Failed to build invocations")
}

pub fn cmd_line(invocation: &Invocation) -> String {
    invocation.args.join(" ")
}

/// Stand-in transcoder.
///
/// Without a trailing `-y` it acts as a probe and prints a 30s 1080p30 h264
/// source with audio, unless the input is named `unreadable_source*`.
/// Otherwise the output is the argument before `-y`: inputs named
/// `fail_source*` exit 3, `signal_source*` log a signal exit and return 255,
/// `slow_source*` report once and block, and everything else reports
/// progress and writes the output.
const FAKE_TRANSCODER: &str = r#"#!/bin/sh
prev=""
last=""
for arg in "$@"; do
  prev="$last"
  last="$arg"
done

if [ "$last" != "-y" ]; then
  case "$*" in
    *unreadable_source*)
      echo "unreadable_source.mp4: Invalid data found when processing input" >&2
      exit 1
      ;;
  esac
  cat >&2 <<'EOF'
Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'source.mp4':
  Duration: 00:00:30.00, start: 0.000000, bitrate: 2500 kb/s
  Stream #0:0(und): Video: h264 (High) (avc1 / 0x31637661), yuv420p, 1920x1080, 2300 kb/s, 30 fps, 30 tbr, 15360 tbn
  Stream #0:1(und): Audio: aac (LC) (mp4a / 0x6134706D), 48000 Hz, stereo, fltp, 128 kb/s
At least one output file must be specified
EOF
  exit 1
fi

case "$*" in
  *fail_source*)
    echo "Error while decoding stream #0:0" >&2
    echo "Conversion failed!" >&2
    exit 3
    ;;
  *signal_source*)
    printf 'frame=   30 fps=0.0 q=28.0 size=     256kB time=00:00:01.00 bitrate=2097.2kbits/s speed=1.00x\r' >&2
    printf 'partial' > "$prev"
    echo "Exiting normally, received signal 15." >&2
    exit 255
    ;;
  *slow_source*)
    printf 'frame=   30 fps=0.0 q=28.0 size=     256kB time=00:00:01.00 bitrate=2097.2kbits/s speed=1.00x\r' >&2
    exec sleep 30
    ;;
esac

printf 'frame=  150 fps=150 q=28.0 size=     512kB time=00:00:02.50 bitrate=1677.7kbits/s speed=2.00x\r' >&2
printf 'frame=  300 fps=150 q=28.0 size=    1024kB time=00:00:05.00 bitrate=1677.7kbits/s speed=2.00x\r' >&2
printf 'fake media' > "$prev"
printf 'video:1000kB audio:24kB subtitle:0kB other streams:0kB global headers:0kB\n' >&2
exit 0
"#;

/// Path of the stand-in transcoder, written once per test binary
#[cfg(unix)]
pub fn fake_transcoder() -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    static PATH: OnceLock<PathBuf> = OnceLock::new();
    PATH.get_or_init(|| {
        let dir = tempfile::TempDir::new()
            .expect("Failed to create temp dir")
            .keep();
        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, FAKE_TRANSCODER).expect("Failed to write fake transcoder");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to mark fake transcoder executable");
        path
    })
    .clone()
}

#[cfg(unix)]
pub fn fake_runner(output_dir: Option<PathBuf>) -> JobRunner {
    JobRunner::new(EngineSettings {
        transcoder: Some(fake_transcoder()),
        threads: None,
        output_dir,
        platform: Platform::Other,
    })
}

/// Touch a source file; the stand-in transcoder never reads it
pub fn source_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"not really a video").expect("Failed to write source");
    path
}

/// Collect events until the terminal one, failing the test after `timeout`
pub fn collect_events(ticket: &JobTicket, timeout: Duration) -> Vec<ProgressEvent> {
    let deadline = Instant::now() + timeout;
    let mut events = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match ticket.events.recv_timeout(remaining) {
            Ok(event) => {
                let done = event.is_terminal();
                events.push(event);
                if done {
                    return events;
                }
            }
            Err(e) => panic!("No terminal event ({}); got {:?}", e, events),
        }
    }
}
