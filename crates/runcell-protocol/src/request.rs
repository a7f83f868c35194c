use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ExecutionConfig;
use crate::error::FrameError;

/// One unit of work delivered to the worker.
///
/// The request is immutable once decoded. `code` is untrusted source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRequest {
    code: String,
    params: Option<Value>,
    config: ExecutionConfig,
}

/// Wire shape before config validation. `config` stays raw so that config
/// failures are reported as [`ConfigError`](crate::ConfigError) rather than
/// as a generic decode error.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRequest {
    code: String,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    config: Value,
}

impl ExecutionRequest {
    /// Creates a request with no params and the default configuration.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            params: None,
            config: ExecutionConfig::default(),
        }
    }

    /// Attaches params. JSON `null` is stored as absent.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = (!params.is_null()).then_some(params);
        self
    }

    /// Replaces the execution configuration.
    #[must_use]
    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Script source text.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Params passed to the script's `main`, if any.
    #[must_use]
    pub const fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }

    /// Execution configuration.
    #[must_use]
    pub const fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub(crate) fn from_slice(bytes: &[u8]) -> Result<Self, FrameError> {
        let raw: RawRequest = serde_json::from_slice(bytes).map_err(FrameError::decode)?;
        let config = ExecutionConfig::from_value(raw.config)?;
        Ok(Self {
            code: raw.code,
            params: raw.params.filter(|value| !value.is_null()),
            config,
        })
    }
}
