//! Shared configuration for the runcell worker.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then an
//! optional configuration file, then `RUNCELL_*` environment variables, and
//! finally command-line flags. Every field is optional at the layer level;
//! the accessors on [`Config`] apply the defaults from [`defaults`] so callers
//! never handle unset values themselves.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

mod channels;
pub mod defaults;

pub use channels::ChannelBinding;
pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_REQUEST_FD, DEFAULT_RESPONSE_FD, DEFAULT_RUNTIME_PROGRAM,
    DEFAULT_SANDBOX_PACKAGE, default_log_filter, default_log_format,
};

/// Shape of the diagnostic lines the worker writes to stderr.
///
/// Hosts that collect worker diagnostics usually want `json`; `compact` is
/// easier to read when running the worker by hand.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, with event fields flattened.
    #[default]
    Json,
    /// One human-readable line per event.
    Compact,
}

/// Worker configuration resolved from defaults, files, environment and CLI.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "RUNCELL")]
pub struct Config {
    /// Tracing filter expression, for example `info` or `runcell_sandbox=debug`.
    pub log_filter: Option<String>,
    /// Output format for diagnostic logging.
    pub log_format: Option<LogFormat>,
    /// Program that starts the isolated runtime.
    pub runtime_program: Option<String>,
    /// Package identifier passed to the isolated runtime.
    pub sandbox_package: Option<String>,
    /// Timeout applied to isolated executions whose request carries none.
    pub default_timeout_seconds: Option<f64>,
    /// Inherited descriptor carrying the request.
    pub request_fd: Option<i32>,
    /// Inherited descriptor receiving the response.
    pub response_fd: Option<i32>,
    /// Filesystem path to read the request from instead of a descriptor.
    pub request_path: Option<Utf8PathBuf>,
    /// Filesystem path to write the response to instead of a descriptor.
    pub response_path: Option<Utf8PathBuf>,
}

impl Config {
    /// Returns the effective log filter.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Returns the effective log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }

    /// Returns the program used to launch the isolated runtime.
    #[must_use]
    pub fn runtime_program(&self) -> &str {
        self.runtime_program
            .as_deref()
            .unwrap_or(DEFAULT_RUNTIME_PROGRAM)
    }

    /// Returns the sandbox package identifier.
    #[must_use]
    pub fn sandbox_package(&self) -> &str {
        self.sandbox_package
            .as_deref()
            .unwrap_or(DEFAULT_SANDBOX_PACKAGE)
    }

    /// Returns the fallback timeout for isolated executions.
    ///
    /// Negative or non-finite values are ignored rather than rejected so a
    /// bad operator setting degrades to "no default" instead of stopping the
    /// worker from answering.
    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_seconds
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Returns where the request is read from.
    #[must_use]
    pub fn request_channel(&self) -> ChannelBinding {
        ChannelBinding::resolve(
            self.request_path.as_ref(),
            self.request_fd.unwrap_or(DEFAULT_REQUEST_FD),
        )
    }

    /// Returns where the response is written to.
    #[must_use]
    pub fn response_channel(&self) -> ChannelBinding {
        ChannelBinding::resolve(
            self.response_path.as_ref(),
            self.response_fd.unwrap_or(DEFAULT_RESPONSE_FD),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::default();
        assert_eq!(config.log_filter(), "info");
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.runtime_program(), "deno");
        assert_eq!(config.sandbox_package(), DEFAULT_SANDBOX_PACKAGE);
        assert_eq!(config.default_timeout(), None);
        assert_eq!(config.request_channel(), ChannelBinding::Descriptor(3));
        assert_eq!(config.response_channel(), ChannelBinding::Descriptor(4));
    }

    #[test]
    fn negative_default_timeout_is_ignored() {
        let config = Config {
            default_timeout_seconds: Some(-1.0),
            ..Config::default()
        };
        assert_eq!(config.default_timeout(), None);
    }

    #[test]
    fn default_timeout_converts_fractional_seconds() {
        let config = Config {
            default_timeout_seconds: Some(1.5),
            ..Config::default()
        };
        assert_eq!(config.default_timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        let format: LogFormat = "COMPACT".parse().expect("parse format");
        assert_eq!(format, LogFormat::Compact);
    }
}
