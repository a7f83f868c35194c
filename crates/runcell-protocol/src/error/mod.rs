//! Error types for request decoding and response framing.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::config::Capability;

/// Errors raised while decoding the `config` object of a request.
///
/// All of these are detected before anything is spawned.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The object has unknown keys, wrong value types, or is not an object.
    #[error("invalid execution config: {message}")]
    Malformed {
        /// Description from the decoder.
        message: String,
        /// Underlying decode error.
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// An allow-list contained an empty or whitespace-only entry.
    #[error("{capability} contains an empty allow-list entry")]
    EmptyAllowListEntry {
        /// Capability whose allow-list was invalid.
        capability: Capability,
    },

    /// An allow-list entry contained the runtime's list separator.
    #[error("{capability} entry '{entry}' must not contain ','")]
    InvalidAllowListEntry {
        /// Capability whose allow-list was invalid.
        capability: Capability,
        /// The offending entry.
        entry: String,
    },

    /// The timeout was negative, not finite, or too large to represent.
    #[error("timeout_seconds must be a finite, non-negative number (got {value})")]
    InvalidTimeout {
        /// The rejected value.
        value: f64,
    },

    /// A memory limit of zero megabytes was requested.
    #[error("memory_limit_mb must be greater than zero")]
    ZeroMemoryLimit,
}

impl ConfigError {
    pub(crate) fn malformed(source: serde_json::Error) -> Self {
        Self::Malformed {
            message: source.to_string(),
            source: Arc::new(source),
        }
    }
}

/// Errors raised while reading a request or writing a response.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Reading from the channel failed.
    #[error("failed to read from channel: {0}")]
    Read(#[source] Arc<io::Error>),

    /// The channel closed without delivering any bytes.
    #[error("channel closed without a message")]
    Empty,

    /// The bytes were not a JSON document of the expected shape.
    #[error("malformed message: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
        /// Underlying decode error, when there is one.
        #[source]
        source: Option<Arc<serde_json::Error>>,
    },

    /// The request was well formed but its `config` was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The response could not be encoded.
    #[error("failed to encode response: {0}")]
    Serialize(#[source] Arc<serde_json::Error>),

    /// Writing to the channel failed.
    #[error("failed to write to channel: {0}")]
    Write(#[source] Arc<io::Error>),
}

impl FrameError {
    pub(crate) fn read(source: io::Error) -> Self {
        Self::Read(Arc::new(source))
    }

    pub(crate) fn write(source: io::Error) -> Self {
        Self::Write(Arc::new(source))
    }

    pub(crate) fn decode(source: serde_json::Error) -> Self {
        Self::Malformed {
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
            source: None,
        }
    }
}
