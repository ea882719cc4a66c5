//! Incremental progress extraction from the transcoder's diagnostic stream.
//!
//! The stream arrives in arbitrary chunks; status lines are terminated by `\r`
//! while the encoder runs and by `\n` otherwise. [`parse_chunk`] is the pure
//! core and [`ProgressParser`] layers percent/ETA and terminal synthesis on top.

use super::error::EngineError;
use super::types::{JobId, ProgressEvent};
use crate::engine::probe::parse_duration;
use crate::engine::worker::ExitReason;
use regex::Regex;
use std::collections::VecDeque;
use std::sync::LazyLock;

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap());
static SPEED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"speed=\s*(\d+(?:\.\d+)?)\s*x").unwrap());
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"size=\s*(\d+)\s*(kB|KiB|MB|MiB|B)?").unwrap());

/// Diagnostic lines kept for failure messages
const STDERR_TAIL_LINES: usize = 8;

/// One status line worth of progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    pub time_seconds: f64,
    pub speed: Option<f64>,
    pub size_bytes: Option<u64>,
}

/// Append `chunk` to the carried-over `buffer`, returning the complete
/// segments and the unterminated remainder.
fn split_segments(buffer: &str, chunk: &str) -> (Vec<String>, String) {
    let mut joined = String::with_capacity(buffer.len() + chunk.len());
    joined.push_str(buffer);
    joined.push_str(chunk);

    match joined.rfind(['\r', '\n']) {
        Some(last) => {
            let remaining = joined[last + 1..].to_string();
            let segments = joined[..last]
                .split(['\r', '\n'])
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .collect();
            (segments, remaining)
        }
        None => (Vec::new(), joined),
    }
}

/// Extract a sample from one status line; lines without `time=` yield nothing
pub fn parse_segment(segment: &str) -> Option<ProgressSample> {
    let caps = TIME_RE.captures(segment)?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;

    let speed = SPEED_RE
        .captures(segment)
        .and_then(|c| c[1].parse::<f64>().ok());
    let size_bytes = SIZE_RE.captures(segment).and_then(|c| {
        let n: u64 = c[1].parse().ok()?;
        let mult = match c.get(2).map(|m| m.as_str()) {
            Some("kB") | Some("KiB") => 1024,
            Some("MB") | Some("MiB") => 1024 * 1024,
            _ => 1,
        };
        Some(n * mult)
    });

    Some(ProgressSample {
        time_seconds: hours * 3600.0 + minutes * 60.0 + seconds,
        speed,
        size_bytes,
    })
}

/// Pure incremental parse: `(buffer, chunk) -> (samples, remaining_buffer)`
pub fn parse_chunk(buffer: &str, chunk: &str) -> (Vec<ProgressSample>, String) {
    let (segments, remaining) = split_segments(buffer, chunk);
    let samples = segments.iter().filter_map(|s| parse_segment(s)).collect();
    (samples, remaining)
}

/// Turns diagnostic chunks into [`ProgressEvent`]s for one job
#[derive(Debug)]
pub struct ProgressParser {
    job_id: JobId,
    total_seconds: Option<f64>,
    buffer: String,
    last_time: f64,
    last_percent: f64,
    progress_offset: f64,
    progress_scale: f64,
    tail: VecDeque<String>,
    cancelled: bool,
    finished: bool,
}

impl ProgressParser {
    pub fn new(job_id: JobId, total_seconds: Option<f64>) -> Self {
        Self {
            job_id,
            total_seconds: total_seconds.filter(|t| *t > 0.0),
            buffer: String::new(),
            last_time: 0.0,
            last_percent: 0.0,
            progress_offset: 0.0,
            progress_scale: 1.0,
            tail: VecDeque::with_capacity(STDERR_TAIL_LINES),
            cancelled: false,
            finished: false,
        }
    }

    /// Start the next invocation of a multi-process job.
    ///
    /// Its 0..100 range maps onto `offset..offset + scale * 100` of the job.
    pub fn begin_invocation(&mut self, total_seconds: Option<f64>, offset: f64, scale: f64) {
        self.total_seconds = total_seconds.filter(|t| *t > 0.0);
        self.buffer.clear();
        self.tail.clear();
        self.last_time = 0.0;
        self.progress_offset = offset;
        self.progress_scale = scale;
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<ProgressEvent> {
        if self.cancelled || self.finished {
            return Vec::new();
        }

        let (segments, remaining) = split_segments(&self.buffer, chunk);
        self.buffer = remaining;

        let mut events = Vec::new();
        for segment in segments {
            match parse_segment(&segment) {
                Some(sample) => {
                    if let Some(event) = self.sample_event(sample) {
                        events.push(event);
                    }
                }
                None => {
                    if self.total_seconds.is_none() {
                        self.total_seconds = parse_duration(&segment).filter(|t| *t > 0.0);
                    }
                    self.remember(segment);
                }
            }
        }
        events
    }

    fn remember(&mut self, line: String) {
        if self.tail.len() == STDERR_TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.trim().to_string());
    }

    fn sample_event(&mut self, sample: ProgressSample) -> Option<ProgressEvent> {
        if sample.time_seconds < self.last_time {
            return None;
        }
        self.last_time = sample.time_seconds;

        let base_pct = match self.total_seconds {
            Some(total) => (sample.time_seconds / total * 100.0).min(100.0),
            None => 0.0,
        };
        let percent = (self.progress_offset + base_pct * self.progress_scale).min(100.0);
        self.last_percent = self.last_percent.max(percent);

        let mut event = ProgressEvent::processing(self.job_id, self.last_percent);
        event.speed_multiplier = sample.speed;
        event.current_output_bytes = sample.size_bytes;
        event.eta_seconds = match (self.total_seconds, sample.speed) {
            (Some(total), Some(speed)) if speed > 0.0 => {
                Some(((total - sample.time_seconds) / speed).max(0.0))
            }
            _ => None,
        };
        Some(event)
    }

    /// Stop parsing; the terminal event becomes `cancelled`
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Synthesize the terminal event for the process exit. Returns `None` once
    /// a terminal event has already been produced.
    ///
    /// `output_bytes` is the on-disk size of the output, read after exit.
    pub fn finish(&mut self, exit: &ExitReason, output_bytes: Option<u64>) -> Option<ProgressEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;

        if self.cancelled {
            return Some(ProgressEvent::cancelled(self.job_id, self.last_percent));
        }

        match exit {
            ExitReason::Normal => {
                self.last_percent = 100.0;
                Some(ProgressEvent::completed(self.job_id, output_bytes))
            }
            ExitReason::Abnormal { code, .. } => {
                // Flush a trailing line the process wrote without a terminator
                let rest = std::mem::take(&mut self.buffer);
                if !rest.trim().is_empty() && parse_segment(&rest).is_none() {
                    self.remember(rest);
                }

                let base = EngineError::ProcessExitError { code: *code }.to_string();
                let message = match self.tail.back() {
                    Some(line) if !line.is_empty() => format!("{}: {}", base, line),
                    _ => base,
                };
                let mut event = ProgressEvent::failed(self.job_id, self.last_percent, message);
                event.exit_code = *code;
                Some(event)
            }
        }
    }

    /// Terminal `failed` event for errors raised outside the process itself
    pub fn fail(&mut self, message: impl Into<String>) -> Option<ProgressEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;
        if self.cancelled {
            return Some(ProgressEvent::cancelled(self.job_id, self.last_percent));
        }
        Some(ProgressEvent::failed(self.job_id, self.last_percent, message))
    }
}
