//! Request dispatch for one worker invocation.
//!
//! The worker reads exactly one request, routes it to the in-process or the
//! isolated backend according to its mode, and writes at most one response.

use std::io::{self, Read, Write};
use std::process::ExitCode;

use serde_json::Value;
use tracing::{error, info, warn};

use runcell_interpreter::{RestrictedExecutor, ScriptError};
use runcell_protocol::{
    ExecutionMode, ExecutionRequest, ExecutionResult, WorkerResponse, read_request, write_response,
};
use runcell_sandbox::{LaunchError, SandboxLauncher};

const DISPATCH_TARGET: &str = "runcell_worker::dispatch";

/// Executes requests whose mode is `in_process`.
pub trait InProcessBackend {
    /// Runs the request's code and returns the value its `main` returned.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError`] when the script fails.
    fn execute(&self, request: &ExecutionRequest) -> Result<Value, ScriptError>;
}

/// Executes requests whose mode is `isolated`.
pub trait IsolatedBackend {
    /// Runs the request in a sandbox runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] on transport-level failures.
    fn launch(&self, request: &ExecutionRequest) -> Result<ExecutionResult, LaunchError>;
}

impl InProcessBackend for RestrictedExecutor<'_> {
    fn execute(&self, request: &ExecutionRequest) -> Result<Value, ScriptError> {
        Self::execute(self, request.code(), request.params())
    }
}

impl IsolatedBackend for SandboxLauncher {
    fn launch(&self, request: &ExecutionRequest) -> Result<ExecutionResult, LaunchError> {
        Self::launch(self, request)
    }
}

/// How a worker invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// A response was written.
    Responded,
    /// An in-process script failed; nothing was written.
    ScriptFailed,
    /// The response could not be written.
    ResponseFailed,
}

impl WorkerOutcome {
    /// Process exit code for this outcome.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Responded => 0,
            Self::ScriptFailed => 1,
            Self::ResponseFailed => 2,
        }
    }
}

impl From<WorkerOutcome> for ExitCode {
    fn from(outcome: WorkerOutcome) -> Self {
        Self::from(outcome.exit_code())
    }
}

/// Routes one request to a backend and frames the answer.
#[derive(Debug)]
pub struct Worker<I, S> {
    in_process: I,
    isolated: S,
}

impl<I, S> Worker<I, S>
where
    I: InProcessBackend,
    S: IsolatedBackend,
{
    /// Creates a worker over the two backends.
    pub const fn new(in_process: I, isolated: S) -> Self {
        Self {
            in_process,
            isolated,
        }
    }

    /// Handles the single request available on `reader`.
    ///
    /// Never panics on bad input: protocol failures become a `sandboxError`
    /// response and every other failure maps to a [`WorkerOutcome`].
    pub fn run<R: Read, W: Write>(&self, reader: R, writer: W) -> WorkerOutcome {
        let request = match read_request(reader) {
            Ok(request) => request,
            Err(err) => {
                warn!(target: DISPATCH_TARGET, error = %err, "rejected request");
                return respond(writer, &WorkerResponse::sandbox_error(err.to_string()));
            }
        };

        let mode = request.config().mode();
        info!(target: DISPATCH_TARGET, ?mode, "dispatching request");

        match mode {
            ExecutionMode::InProcess => match self.in_process.execute(&request) {
                Ok(value) => respond(writer, &WorkerResponse::Value(value)),
                Err(err) => {
                    error!(
                        target: DISPATCH_TARGET,
                        kind = err.kind(),
                        detail = err.message(),
                        "script failed"
                    );
                    // The host reads the failure from stderr whatever the log filter.
                    drop(writeln!(io::stderr().lock(), "{err}"));
                    drop(writer);
                    WorkerOutcome::ScriptFailed
                }
            },
            ExecutionMode::Isolated => match self.isolated.launch(&request) {
                Ok(result) => respond(writer, &WorkerResponse::Execution(result)),
                Err(err) => {
                    warn!(target: DISPATCH_TARGET, error = %err, "sandbox launch failed");
                    respond(writer, &WorkerResponse::sandbox_error(err.to_string()))
                }
            },
        }
    }
}

/// Answers without reading a request, for failures that prevent dispatch.
pub fn reject<W: Write>(writer: W, message: &str) -> WorkerOutcome {
    respond(writer, &WorkerResponse::sandbox_error(message))
}

fn respond<W: Write>(writer: W, response: &WorkerResponse) -> WorkerOutcome {
    match write_response(writer, response) {
        Ok(()) => WorkerOutcome::Responded,
        Err(err) => {
            error!(target: DISPATCH_TARGET, error = %err, "failed to write response");
            WorkerOutcome::ResponseFailed
        }
    }
}
