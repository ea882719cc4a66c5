//! Job orchestration: Probe -> Build -> Spawn -> Parse -> terminal event.
//!
//! Every submitted job runs on its own worker thread and reports through a
//! channel of [`ProgressEvent`]s that always ends with exactly one terminal
//! event.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use chrono::Local;
use tracing::{debug, info, warn};

use super::core::{
    BuildSettings, EngineError, EngineResult, EventState, Invocation, Job, JobId, JobOptions,
    JobState, ProgressEvent, ProgressParser, build_invocations, format_invocation,
    resolve_output_paths,
};
use super::hardware::Platform;
use super::probe::{self, MediaMetadata};
use super::worker::{ExitReason, ProcessSupervisor};

/// Host configuration shared by every job
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Resolved transcoder executable; `None` makes every submission fail
    pub transcoder: Option<PathBuf>,
    pub threads: Option<u32>,
    /// Directory for generated output names; defaults to the source's directory
    pub output_dir: Option<PathBuf>,
    pub platform: Platform,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            transcoder: None,
            threads: None,
            output_dir: None,
            platform: Platform::current(),
        }
    }
}

impl EngineSettings {
    fn build_settings(&self) -> BuildSettings {
        BuildSettings {
            threads: self.threads,
            platform: self.platform,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobRequest {
    pub id: Option<JobId>,
    pub source_path: PathBuf,
    pub options: JobOptions,
    /// Explicit output file; split jobs number their parts after it
    pub output_path: Option<PathBuf>,
}

impl JobRequest {
    pub fn new(source_path: impl Into<PathBuf>, options: JobOptions) -> Self {
        Self {
            id: None,
            source_path: source_path.into(),
            options,
            output_path: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output_path = Some(output.into());
        self
    }
}

/// Accepted job: its id, resolved outputs and event stream
pub struct JobTicket {
    pub id: JobId,
    pub output_paths: Vec<PathBuf>,
    pub events: Receiver<ProgressEvent>,
}

impl JobTicket {
    /// Drain events until the terminal one and return it
    pub fn wait(self) -> Option<ProgressEvent> {
        self.events.iter().find(ProgressEvent::is_terminal)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-job state shared between the runner and the job's worker thread.
///
/// Events are sent while holding `state`, and `cancel` flips `cancelled`
/// under the same lock, so no progress event can follow a successful cancel.
struct JobControl {
    state: Mutex<JobState>,
    cancelled: AtomicBool,
}

impl JobControl {
    fn new() -> Self {
        Self {
            state: Mutex::new(JobState::Queued),
            cancelled: AtomicBool::new(false),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Sends one job's events in order and enforces the single terminal event
struct Emitter {
    job_id: JobId,
    control: Arc<JobControl>,
    tx: Sender<ProgressEvent>,
}

impl Emitter {
    fn set_state(&self, next: JobState) {
        lock(&self.control.state).advance(next);
    }

    /// Send a non-terminal event; dropped once the job is cancelled or done
    fn progress(&self, event: ProgressEvent) {
        let state = lock(&self.control.state);
        if state.is_terminal() || self.control.is_cancelled() {
            return;
        }
        // A dropped receiver only means nobody is listening any more
        let _ = self.tx.send(event);
    }

    fn terminal(&self, mut event: ProgressEvent) {
        let mut state = lock(&self.control.state);
        if state.is_terminal() {
            return;
        }
        if self.control.is_cancelled() && event.state != EventState::Cancelled {
            event = ProgressEvent::cancelled(self.job_id, event.percent);
        }
        state.advance(match event.state {
            EventState::Completed => JobState::Completed,
            EventState::Cancelled => JobState::Cancelled,
            _ => JobState::Failed,
        });
        debug!(job_id = %self.job_id, state = ?*state, "job finished");
        let _ = self.tx.send(event);
    }
}

/// Runs jobs against one transcoder executable
pub struct JobRunner {
    settings: EngineSettings,
    supervisor: Arc<ProcessSupervisor>,
    jobs: Mutex<HashMap<JobId, Arc<JobControl>>>,
}

impl JobRunner {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            supervisor: Arc::new(ProcessSupervisor::new()),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Usable transcoder path, or `TranscoderUnavailable`
    pub fn transcoder(&self) -> EngineResult<&Path> {
        match &self.settings.transcoder {
            Some(path) if path.is_file() => Ok(path),
            _ => Err(EngineError::TranscoderUnavailable),
        }
    }

    /// Validate the request and turn it into a job with resolved outputs
    fn prepare(&self, request: JobRequest) -> EngineResult<Job> {
        self.transcoder()?;
        if !request.source_path.is_file() {
            return Err(EngineError::SourceNotFound(request.source_path));
        }
        request.options.validate()?;

        let default_dir = match &self.settings.output_dir {
            Some(dir) => dir.clone(),
            None => request
                .source_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();

        let mut job = Job::new(request.id, request.source_path, request.options);
        job.output_paths = resolve_output_paths(
            &job.source_path,
            &job.options,
            request.output_path.as_deref(),
            &default_dir,
            &stamp,
        );
        Ok(job)
    }

    /// Probe the source and build the job's invocations without running them
    pub fn plan(&self, request: JobRequest) -> EngineResult<(Job, Vec<Invocation>)> {
        let job = self.prepare(request)?;
        let meta = probe_for(self.transcoder()?, &job)?;
        let invocations = build_invocations(&job, &meta, &self.settings.build_settings())?;
        Ok((job, invocations))
    }

    /// Accept a job and start it on a worker thread.
    ///
    /// Build-time problems (no transcoder, missing source, invalid options,
    /// duplicate id) are returned here; everything later arrives as events.
    pub fn submit(&self, request: JobRequest) -> EngineResult<JobTicket> {
        let job = self.prepare(request)?;
        let transcoder = self.transcoder()?.to_path_buf();

        let control = Arc::new(JobControl::new());
        {
            let mut jobs = lock(&self.jobs);
            if let Some(existing) = jobs.get(&job.id) {
                if !lock(&existing.state).is_terminal() {
                    return Err(EngineError::AlreadyRunning(job.id));
                }
            }
            jobs.insert(job.id, Arc::clone(&control));
        }

        let (tx, rx) = mpsc::channel();
        let ticket = JobTicket {
            id: job.id,
            output_paths: job.output_paths.clone(),
            events: rx,
        };

        info!(job_id = %job.id, kind = ?job.kind(), source = %job.source_path.display(), "job submitted");

        let emitter = Emitter {
            job_id: job.id,
            control,
            tx,
        };
        let supervisor = Arc::clone(&self.supervisor);
        let build_settings = self.settings.build_settings();
        thread::spawn(move || {
            run_job(job, &transcoder, &build_settings, &supervisor, &emitter);
        });

        Ok(ticket)
    }

    /// Cancel a job that has not finished yet.
    ///
    /// Tracking is dropped immediately; the process exits asynchronously and
    /// the job's last event is `cancelled`.
    pub fn cancel(&self, job_id: JobId) -> bool {
        let Some(control) = lock(&self.jobs).get(&job_id).cloned() else {
            return false;
        };
        {
            let state = lock(&control.state);
            if state.is_terminal() || control.is_cancelled() {
                return false;
            }
            control.cancelled.store(true, Ordering::SeqCst);
        }
        self.supervisor.cancel(job_id);
        info!(%job_id, "job cancelled");
        true
    }

    pub fn state(&self, job_id: JobId) -> Option<JobState> {
        let control = lock(&self.jobs).get(&job_id).cloned()?;
        let state = *lock(&control.state);
        Some(state)
    }

    /// Drop bookkeeping for a finished job
    pub fn forget(&self, job_id: JobId) -> bool {
        let mut jobs = lock(&self.jobs);
        match jobs.get(&job_id) {
            Some(control) if lock(&control.state).is_terminal() => {
                jobs.remove(&job_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_process_tracked(&self, job_id: JobId) -> bool {
        self.supervisor.is_tracked(job_id)
    }
}

/// Probe, tolerating failure unless the job cannot be planned without metadata
fn probe_for(transcoder: &Path, job: &Job) -> EngineResult<MediaMetadata> {
    match probe::probe(transcoder, &job.source_path) {
        Ok(meta) => Ok(meta),
        Err(e) => {
            let required = match &job.options {
                JobOptions::Compress(o) => o.requires_duration(),
                JobOptions::Trim(o) => o.needs_audio_layout(),
                JobOptions::Effects(_) => false,
            };
            if required {
                return Err(e);
            }
            warn!(job_id = %job.id, error = %e, "probe failed, continuing with unknown duration and audio");
            Ok(MediaMetadata {
                file_size_bytes: fs::metadata(&job.source_path).map(|m| m.len()).unwrap_or(0),
                ..MediaMetadata::default()
            })
        }
    }
}

fn remove_outputs(paths: &[PathBuf]) {
    for path in paths {
        if path.exists() {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed partial output"),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial output"),
            }
        }
    }
}

fn run_job(
    job: Job,
    transcoder: &Path,
    settings: &BuildSettings,
    supervisor: &ProcessSupervisor,
    emitter: &Emitter,
) {
    let mut parser = ProgressParser::new(job.id, None);
    let cancelled = || emitter.control.is_cancelled();
    let fail = |parser: &mut ProgressParser, message: String| {
        if let Some(event) = parser.fail(message) {
            emitter.terminal(event);
        }
    };

    emitter.set_state(JobState::Probing);
    emitter.progress(ProgressEvent::analyzing(job.id));

    let invocations = match probe_for(transcoder, &job)
        .and_then(|meta| build_invocations(&job, &meta, settings))
    {
        Ok(invocations) => invocations,
        Err(e) => return fail(&mut parser, e.to_string()),
    };

    for path in &job.output_paths {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(dir) {
                return fail(
                    &mut parser,
                    format!("Failed to create output directory {}: {}", dir.display(), e),
                );
            }
        }
    }

    emitter.set_state(JobState::Running);
    let count = invocations.len();

    for (idx, invocation) in invocations.iter().enumerate() {
        if cancelled() {
            parser.cancel();
            break;
        }

        let scale = 1.0 / count as f64;
        parser.begin_invocation(invocation.expected_duration, idx as f64 * scale * 100.0, scale);
        debug!(job_id = %job.id, cmd = %format_invocation(transcoder, invocation), "starting invocation");

        let mut process = match supervisor.spawn(job.id, transcoder, &invocation.args) {
            Ok(process) => process,
            Err(e) => return fail(&mut parser, e.to_string()),
        };
        // A cancel that raced the spawn saw nothing to signal
        if cancelled() {
            supervisor.cancel(job.id);
        }

        for chunk in process.stream_stderr() {
            if cancelled() {
                parser.cancel();
                continue;
            }
            for event in parser.feed(&chunk) {
                emitter.progress(event);
            }
        }

        let reason = match supervisor.wait(process) {
            Ok(reason) => reason,
            Err(e) => return fail(&mut parser, e.to_string()),
        };

        // Only an explicit cancel counts; a signal from elsewhere is a failure
        if cancelled() {
            parser.cancel();
            break;
        }

        match reason {
            ExitReason::Normal if !invocation.output_path.exists() => {
                remove_outputs(&job.output_paths);
                return fail(
                    &mut parser,
                    format!("Output file not created: {}", invocation.output_path.display()),
                );
            }
            ExitReason::Normal if idx + 1 < count => continue,
            ExitReason::Normal => {
                let bytes = job
                    .output_paths
                    .iter()
                    .filter_map(|p| fs::metadata(p).ok())
                    .map(|m| m.len())
                    .sum::<u64>();
                if let Some(mut event) = parser.finish(&reason, Some(bytes)) {
                    event.output_path = job.output_path().map(Path::to_path_buf);
                    if job.output_paths.len() > 1 {
                        event.output_files = job.output_paths.clone();
                    }
                    info!(job_id = %job.id, bytes, "job completed");
                    emitter.terminal(event);
                }
                return;
            }
            ExitReason::Abnormal { code, .. } => {
                warn!(job_id = %job.id, ?code, "transcoder failed");
                remove_outputs(&job.output_paths);
                if let Some(event) = parser.finish(&reason, None) {
                    emitter.terminal(event);
                }
                return;
            }
        }
    }

    // Only reached through cancellation; partial output is kept
    parser.cancel();
    if let Some(event) = parser.fail(EngineError::Cancelled.to_string()) {
        emitter.terminal(event);
    }
}
