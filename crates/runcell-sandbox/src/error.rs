//! Errors raised while launching the sandbox runtime.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Transport-level failures of a sandbox launch.
///
/// Script failures and timeouts are not errors at this level; they are
/// reported through an error-status
/// [`ExecutionResult`](runcell_protocol::ExecutionResult).
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The program text could not be assembled.
    #[error("failed to assemble sandbox script: {0}")]
    Assembly(#[source] Arc<serde_json::Error>),

    /// The runtime process could not be started.
    #[error("failed to spawn sandbox runtime '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying error.
        #[source]
        source: Arc<io::Error>,
    },

    /// A standard stream of the child was not captured.
    #[error("sandbox runtime {stream} was not captured")]
    MissingPipe {
        /// Stream name.
        stream: &'static str,
    },

    /// Waiting on the child process failed.
    #[error("I/O error while supervising sandbox runtime: {source}")]
    Io {
        /// Underlying error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The runtime wrote something other than its JSON report to stdout.
    #[error("sandbox runtime produced malformed output: {message}")]
    MalformedOutput {
        /// Description of the problem.
        message: String,
        /// Underlying decode error.
        #[source]
        source: Option<Arc<serde_json::Error>>,
    },
}

impl LaunchError {
    pub(crate) fn spawn(program: &str, source: io::Error) -> Self {
        Self::Spawn {
            program: program.to_owned(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn io(source: io::Error) -> Self {
        Self::Io {
            source: Arc::new(source),
        }
    }
}

impl From<serde_json::Error> for LaunchError {
    fn from(source: serde_json::Error) -> Self {
        Self::Assembly(Arc::new(source))
    }
}
