// Process supervision: one tracked transcoder process per job id

use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use super::core::{EngineError, EngineResult, JobId};

/// How often `wait` polls a child that may be cancelled concurrently
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Why a tracked process stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Exit code 0
    Normal,
    Abnormal {
        code: Option<i32>,
        signal: Option<i32>,
    },
}

impl ExitReason {
    pub fn from_status(status: &ExitStatus) -> Self {
        if status.success() {
            return ExitReason::Normal;
        }
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        ExitReason::Abnormal {
            code: status.code(),
            signal,
        }
    }
}

struct Tracked {
    pid: u32,
    #[cfg_attr(unix, allow(dead_code))]
    child: Arc<Mutex<Child>>,
}

/// A process started by [`ProcessSupervisor::spawn`]
pub struct SpawnedProcess {
    pub job_id: JobId,
    pub pid: u32,
    child: Arc<Mutex<Child>>,
    stderr: Option<ChildStderr>,
}

impl SpawnedProcess {
    /// Forward the diagnostic stream as text chunks, in arrival order.
    ///
    /// The channel closes when the process closes its stderr.
    pub fn stream_stderr(&mut self) -> Receiver<String> {
        let (tx, rx) = mpsc::channel();
        if let Some(stderr) = self.stderr.take() {
            thread::spawn(move || forward_chunks(stderr, &tx));
        }
        rx
    }
}

/// Send what `reader` yields until it ends or nobody is listening
fn forward_chunks<R: Read>(mut reader: R, tx: &Sender<String>) {
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(error = %e, "stderr reader stopped");
                break;
            }
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                if tx.send(chunk).is_err() {
                    break;
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Job id -> live process table
#[derive(Default)]
pub struct ProcessSupervisor {
    table: Mutex<HashMap<JobId, Tracked>>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `program args…` for `job_id`.
    ///
    /// The table lock is held across the check and the insert, so two spawns
    /// for one id can never both succeed.
    pub fn spawn(&self, job_id: JobId, program: &Path, args: &[String]) -> EngineResult<SpawnedProcess> {
        let mut table = lock(&self.table);
        if table.contains_key(&job_id) {
            return Err(EngineError::AlreadyRunning(job_id));
        }

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(EngineError::ProcessSpawnError)?;

        let pid = child.id();
        let stderr = child.stderr.take();
        let child = Arc::new(Mutex::new(child));
        table.insert(
            job_id,
            Tracked {
                pid,
                child: Arc::clone(&child),
            },
        );
        debug!(%job_id, pid, program = %program.display(), "spawned transcoder");

        Ok(SpawnedProcess {
            job_id,
            pid,
            child,
            stderr,
        })
    }

    /// Request termination and stop tracking `job_id`; does not wait for the exit.
    ///
    /// Returns false when no process is tracked for the id.
    pub fn cancel(&self, job_id: JobId) -> bool {
        let Some(tracked) = lock(&self.table).remove(&job_id) else {
            return false;
        };
        debug!(%job_id, pid = tracked.pid, "cancelling transcoder");
        terminate(&tracked);
        true
    }

    pub fn is_tracked(&self, job_id: JobId) -> bool {
        lock(&self.table).contains_key(&job_id)
    }

    /// Block until the process exits, then drop its tracking entry.
    ///
    /// Only the entry for this pid is removed; a cancelled job whose id was
    /// reused for a newer process keeps the newer entry.
    pub fn wait(&self, process: SpawnedProcess) -> EngineResult<ExitReason> {
        let status = loop {
            if let Some(status) = lock(&process.child).try_wait()? {
                break status;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        };

        {
            let mut table = lock(&self.table);
            if table
                .get(&process.job_id)
                .is_some_and(|t| t.pid == process.pid)
            {
                table.remove(&process.job_id);
            }
        }

        let reason = ExitReason::from_status(&status);
        debug!(job_id = %process.job_id, pid = process.pid, ?reason, "transcoder exited");
        Ok(reason)
    }
}

#[cfg(unix)]
fn terminate(tracked: &Tracked) {
    // SIGTERM lets the transcoder finalize the container before exiting
    let Ok(pid) = libc::pid_t::try_from(tracked.pid) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        warn!(pid, error = %std::io::Error::last_os_error(), "failed to signal transcoder");
    }
}

#[cfg(not(unix))]
fn terminate(tracked: &Tracked) {
    if let Err(e) = lock(&tracked.child).kill() {
        warn!(pid = tracked.pid, error = %e, "failed to kill transcoder");
    }
}
