//! Values written to the response channel.
//!
//! A worker answers with exactly one [`WorkerResponse`]. Isolated executions
//! produce an [`ExecutionResult`]; in-process executions produce the script's
//! literal return value; protocol failures produce a `sandboxError` object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::SessionState;

/// Outcome classification of an isolated execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The script completed and produced a result.
    Success,
    /// The script raised, timed out, or the runtime failed.
    Error,
}

/// Result of one isolated execution.
///
/// An `Error` status always carries a `null` result; the constructors
/// enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    status: ExecutionStatus,
    #[serde(default)]
    result: Value,
    stdout: Option<String>,
    stderr: Option<String>,
    execution_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_bytes: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_metadata: Option<Map<String, Value>>,
}

impl ExecutionResult {
    /// Creates a successful result.
    #[must_use]
    pub const fn success(result: Value) -> Self {
        Self {
            status: ExecutionStatus::Success,
            result,
            stdout: None,
            stderr: None,
            execution_time: 0.0,
            session_bytes: None,
            session_metadata: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub const fn error() -> Self {
        Self {
            status: ExecutionStatus::Error,
            result: Value::Null,
            stdout: None,
            stderr: None,
            execution_time: 0.0,
            session_bytes: None,
            session_metadata: None,
        }
    }

    /// Attaches captured standard output.
    #[must_use]
    pub fn with_stdout(mut self, stdout: Option<String>) -> Self {
        self.stdout = stdout;
        self
    }

    /// Attaches captured standard error.
    #[must_use]
    pub fn with_stderr(mut self, stderr: Option<String>) -> Self {
        self.stderr = stderr;
        self
    }

    /// Records the wall-clock duration in seconds. Negative or non-finite
    /// values are stored as zero.
    #[must_use]
    pub fn with_execution_time(mut self, seconds: f64) -> Self {
        self.execution_time = if seconds.is_finite() && seconds > 0.0 {
            seconds
        } else {
            0.0
        };
        self
    }

    /// Attaches updated session state reported by the sandbox.
    #[must_use]
    pub fn with_session(mut self, session: SessionState) -> Self {
        let (bytes, metadata) = session.into_parts();
        self.session_bytes = bytes;
        self.session_metadata = metadata;
        self
    }

    /// Outcome classification.
    #[must_use]
    pub const fn status(&self) -> ExecutionStatus {
        self.status
    }

    /// Value returned by the script. Always `null` on error.
    #[must_use]
    pub const fn result(&self) -> &Value {
        &self.result
    }

    /// Captured standard output.
    #[must_use]
    pub fn stdout(&self) -> Option<&str> {
        self.stdout.as_deref()
    }

    /// Captured standard error or the failure description.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        self.stderr.as_deref()
    }

    /// Wall-clock duration in seconds.
    #[must_use]
    pub const fn execution_time(&self) -> f64 {
        self.execution_time
    }

    /// Session state to supply on the next stateful invocation.
    #[must_use]
    pub fn session(&self) -> SessionState {
        SessionState::new(self.session_bytes.clone(), self.session_metadata.clone())
    }

    pub(crate) fn is_consistent(&self) -> bool {
        let result_ok = match self.status {
            ExecutionStatus::Success => true,
            ExecutionStatus::Error => self.result.is_null(),
        };
        result_ok && self.execution_time.is_finite() && self.execution_time >= 0.0
    }
}

/// The single message a worker writes to its response channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WorkerResponse {
    /// The request could not be handled at the protocol level.
    SandboxError {
        /// Human-readable description of the failure.
        #[serde(rename = "sandboxError")]
        message: String,
    },
    /// Result of an isolated execution.
    Execution(ExecutionResult),
    /// Literal value returned by an in-process script.
    Value(Value),
}

impl WorkerResponse {
    /// Builds a protocol failure response.
    pub fn sandbox_error(message: impl Into<String>) -> Self {
        Self::SandboxError {
            message: message.into(),
        }
    }

    /// Returns the failure message when this is a protocol failure.
    #[must_use]
    pub fn sandbox_error_message(&self) -> Option<&str> {
        match self {
            Self::SandboxError { message } => Some(message),
            Self::Execution(_) | Self::Value(_) => None,
        }
    }
}

impl From<ExecutionResult> for WorkerResponse {
    fn from(result: ExecutionResult) -> Self {
        Self::Execution(result)
    }
}
