//! Supervised execution of the sandbox runtime.
//!
//! [`SandboxLauncher`] spawns the runtime in its own process group with
//! stdout and stderr piped, forwards both pipes from reader threads, and polls
//! the child against the request timeout. Once the runtime has exited or timed
//! out, the whole process group is killed so that stray descendants cannot
//! hold the pipes open, and output is gathered no later than the deadline.

use std::io::{self, Read};
use std::os::unix::process::CommandExt;
use std::process::{Child, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use runcell_protocol::{ExecutionRequest, ExecutionResult, SessionState};

use crate::error::LaunchError;
use crate::invocation::{RuntimeCommand, SandboxInvocation};

const LAUNCHER_TARGET: &str = "runcell_sandbox::launcher";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Time allowed for buffered output to arrive after the process group is
/// gone, when the deadline has already passed or none was set.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

const READ_CHUNK: usize = 8 * 1024;

/// Launches sandbox runtimes for execution requests.
#[derive(Debug, Clone)]
pub struct SandboxLauncher {
    runtime: RuntimeCommand,
    default_timeout: Option<Duration>,
}

impl SandboxLauncher {
    /// Creates a launcher with no fallback timeout.
    #[must_use]
    pub const fn new(runtime: RuntimeCommand) -> Self {
        Self {
            runtime,
            default_timeout: None,
        }
    }

    /// Sets the timeout applied when a request carries none.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Runs `request` in a fresh runtime process and decodes its report.
    ///
    /// Script failures and timeouts produce an error-status result rather
    /// than an `Err`. The timeout bounds the whole launch: processes the
    /// runtime leaves behind are killed with it and cannot delay the return.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] when the runtime cannot be spawned or
    /// supervised, or when it writes a non-JSON report to stdout.
    pub fn launch(&self, request: &ExecutionRequest) -> Result<ExecutionResult, LaunchError> {
        let limits = request.config().limits().or_timeout(self.default_timeout);
        let invocation = SandboxInvocation::build(&self.runtime, request, &limits)?;

        let mut command = invocation.to_command();
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        debug!(
            target: LAUNCHER_TARGET,
            program = invocation.program(),
            args = invocation.args().len(),
            timeout_ms = limits.timeout().map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
            "spawning sandbox runtime"
        );

        let started = Instant::now();
        let deadline = limits.timeout().and_then(|limit| started.checked_add(limit));
        let mut child = command
            .spawn()
            .map_err(|err| LaunchError::spawn(invocation.program(), err))?;

        let readers = (
            drain(child.stdout.take(), "stdout"),
            drain(child.stderr.take(), "stderr"),
        );
        let (stdout_reader, stderr_reader) = match readers {
            (Ok(stdout), Ok(stderr)) => (stdout, stderr),
            (Err(err), _) | (_, Err(err)) => {
                terminate(&mut child);
                return Err(err);
            }
        };

        let supervised = supervise(&mut child, limits.timeout(), deadline);
        if let Err(reason) = kill_group(&child) {
            debug!(target: LAUNCHER_TARGET, %reason, "failed to clear sandbox process group");
        }
        let completion = supervised?;

        let until = drain_until(deadline);
        let stdout = stdout_reader.collect(until);
        let stderr = stderr_reader.collect(until);
        let elapsed = started.elapsed().as_secs_f64();

        match completion {
            Completion::TimedOut(timeout) => {
                warn!(
                    target: LAUNCHER_TARGET,
                    timeout_secs = timeout.as_secs_f64(),
                    "sandbox runtime timed out"
                );
                Ok(ExecutionResult::error()
                    .with_stderr(Some(format!(
                        "Execution timed out after {} seconds",
                        timeout.as_secs_f64()
                    )))
                    .with_execution_time(elapsed))
            }
            Completion::Exited(status) => {
                debug!(
                    target: LAUNCHER_TARGET,
                    ?status,
                    stdout_bytes = stdout.len(),
                    stderr_bytes = stderr.len(),
                    "sandbox runtime exited"
                );
                decode_output(&stdout, &stderr).map(|result| result.with_execution_time(elapsed))
            }
        }
    }
}

enum Completion {
    Exited(ExitStatus),
    TimedOut(Duration),
}

/// Output forwarded from one of the runtime's pipes.
struct PipeReader {
    stream: &'static str,
    chunks: Receiver<Vec<u8>>,
}

impl PipeReader {
    /// Gathers forwarded output until the pipe closes or `until` passes.
    ///
    /// Whatever arrived before `until` is kept. The reader thread is left to
    /// finish on its own if a process outside the group still holds the pipe.
    fn collect(&self, until: Instant) -> Vec<u8> {
        let mut bytes = Vec::new();
        loop {
            let remaining = until.saturating_duration_since(Instant::now());
            match self.chunks.recv_timeout(remaining) {
                Ok(chunk) => bytes.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        target: LAUNCHER_TARGET,
                        stream = self.stream,
                        "sandbox runtime pipe still open after the runtime finished"
                    );
                    break;
                }
            }
        }
        bytes
    }
}

fn drain(
    pipe: Option<impl Read + Send + 'static>,
    stream: &'static str,
) -> Result<PipeReader, LaunchError> {
    let mut pipe = pipe.ok_or(LaunchError::MissingPipe { stream })?;
    let (sender, chunks) = mpsc::channel();
    thread::spawn(move || {
        loop {
            let mut chunk = vec![0_u8; READ_CHUNK];
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => {
                    chunk.truncate(read);
                    if sender.send(chunk).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    warn!(target: LAUNCHER_TARGET, stream, %err, "failed to drain sandbox runtime pipe");
                    break;
                }
            }
        }
    });
    Ok(PipeReader { stream, chunks })
}

fn drain_until(deadline: Option<Instant>) -> Instant {
    let now = Instant::now();
    let grace = now.checked_add(DRAIN_GRACE).unwrap_or(now);
    deadline.map_or(grace, |deadline| deadline.max(grace))
}

fn supervise(
    child: &mut Child,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
) -> Result<Completion, LaunchError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Completion::Exited(status)),
            Ok(None) => {
                let wait = match (timeout, deadline) {
                    (Some(limit), Some(deadline)) => {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            terminate(child);
                            return Ok(Completion::TimedOut(limit));
                        }
                        POLL_INTERVAL.min(remaining)
                    }
                    _ => POLL_INTERVAL,
                };
                thread::sleep(wait);
            }
            Err(err) => {
                terminate(child);
                return Err(LaunchError::io(err));
            }
        }
    }
}

/// Sends `SIGKILL` to the child's process group. An already empty group is
/// not an error.
fn kill_group(child: &Child) -> Result<(), String> {
    let group = i32::try_from(child.id()).map_err(|err| err.to_string())?;
    match killpg(Pid::from_raw(group), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(errno.to_string()),
    }
}

/// Kills the child's process group, falling back to the child alone, and
/// reaps it.
fn terminate(child: &mut Child) {
    if let Err(reason) = kill_group(child) {
        debug!(target: LAUNCHER_TARGET, %reason, "process group kill failed, killing child");
        if let Err(err) = child.kill() {
            debug!(target: LAUNCHER_TARGET, %err, "child kill failed");
        }
    }
    if let Err(err) = child.wait() {
        warn!(target: LAUNCHER_TARGET, %err, "failed to reap sandbox runtime");
    }
}

/// Self-report the runtime prints to stdout on completion.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeReport {
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    session_bytes: Option<Vec<u8>>,
    #[serde(default)]
    session_metadata: Option<Map<String, Value>>,
}

impl From<RuntimeReport> for ExecutionResult {
    fn from(report: RuntimeReport) -> Self {
        let session = SessionState::new(report.session_bytes, report.session_metadata);
        if report.success {
            Self::success(report.result)
                .with_stdout(report.stdout)
                .with_stderr(report.stderr)
                .with_session(session)
        } else {
            Self::error()
                .with_stdout(report.stdout)
                .with_stderr(report.stderr.or(report.error))
                .with_session(session)
        }
    }
}

fn decode_output(stdout: &[u8], stderr: &[u8]) -> Result<ExecutionResult, LaunchError> {
    if stdout.trim_ascii().is_empty() {
        return Ok(ExecutionResult::error()
            .with_stderr(Some(String::from_utf8_lossy(stderr).into_owned())));
    }

    if !stderr.is_empty() {
        debug!(
            target: LAUNCHER_TARGET,
            stderr = %String::from_utf8_lossy(stderr).trim(),
            "sandbox runtime diagnostics"
        );
    }

    let report: RuntimeReport =
        serde_json::from_slice(stdout).map_err(|err| LaunchError::MalformedOutput {
            message: err.to_string(),
            source: Some(err.into()),
        })?;
    Ok(report.into())
}
