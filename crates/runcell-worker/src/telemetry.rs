//! Diagnostic logging for the worker.
//!
//! Diagnostics are written to stderr and nowhere else. Channel binding refuses
//! descriptors 0 to 2, so a log line can never land on the request or response
//! channel. Installing the subscriber cannot fail the worker: a filter
//! expression that does not parse is replaced by [`DEFAULT_LOG_FILTER`] and the
//! rejection is logged once the fallback subscriber is in place.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, debug, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use runcell_config::{Config, DEFAULT_LOG_FILTER, LogFormat};

const TELEMETRY_TARGET: &str = "runcell_worker::telemetry";

static INSTALLED: OnceCell<TelemetryHandle> = OnceCell::new();

/// A filter expression that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFilter {
    expression: String,
    reason: String,
}

impl RejectedFilter {
    /// The expression as configured.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Why the expression did not parse.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Describes the diagnostics filter in force.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryHandle {
    filter: String,
    rejected: Option<RejectedFilter>,
}

impl TelemetryHandle {
    /// The filter expression diagnostics are selected by.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// The configured expression, when it was replaced by the default.
    #[must_use]
    pub const fn rejected(&self) -> Option<&RejectedFilter> {
        self.rejected.as_ref()
    }
}

/// Installs the stderr subscriber on first use and describes it.
///
/// Later calls return the first handle without touching global state. When
/// another subscriber already owns the process, the worker keeps logging
/// through it.
pub fn initialise(config: &Config) -> TelemetryHandle {
    INSTALLED.get_or_init(|| install(config)).clone()
}

fn install(config: &Config) -> TelemetryHandle {
    let (filter, handle) = resolve_filter(config.log_filter());
    let installed = tracing::subscriber::set_global_default(stderr_subscriber(
        filter,
        config.log_format(),
    ));

    if let Err(err) = installed {
        debug!(target: TELEMETRY_TARGET, %err, "keeping existing subscriber");
    }
    if let Some(rejected) = handle.rejected() {
        warn!(
            target: TELEMETRY_TARGET,
            filter = rejected.expression(),
            reason = rejected.reason(),
            fallback = DEFAULT_LOG_FILTER,
            "log filter rejected"
        );
    }
    handle
}

/// Parses `expression`, falling back to [`DEFAULT_LOG_FILTER`].
fn resolve_filter(expression: &str) -> (EnvFilter, TelemetryHandle) {
    match EnvFilter::try_new(expression) {
        Ok(filter) => (
            filter,
            TelemetryHandle {
                filter: expression.to_owned(),
                rejected: None,
            },
        ),
        Err(err) => (
            EnvFilter::new(DEFAULT_LOG_FILTER),
            TelemetryHandle {
                filter: DEFAULT_LOG_FILTER.to_owned(),
                rejected: Some(RejectedFilter {
                    expression: expression.to_owned(),
                    reason: err.to_string(),
                }),
            },
        ),
    }
}

fn stderr_subscriber(filter: EnvFilter, format: LogFormat) -> Box<dyn Subscriber + Send + Sync> {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    match format {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::unclosed_span("runcell=[")]
    #[case::bad_level("runcell=loudest")]
    fn unparsable_filter_falls_back_to_default(#[case] expression: &str) {
        let (_, handle) = resolve_filter(expression);

        assert_eq!(handle.filter(), DEFAULT_LOG_FILTER);
        let rejected = handle.rejected().expect("filter should be rejected");
        assert_eq!(rejected.expression(), expression);
        assert!(!rejected.reason().is_empty());
    }

    #[test]
    fn valid_filter_is_kept() {
        let (_, handle) = resolve_filter("runcell_sandbox=debug,warn");
        assert_eq!(handle.filter(), "runcell_sandbox=debug,warn");
        assert!(handle.rejected().is_none());
    }

    #[test]
    fn initialise_never_fails_on_a_bad_filter() {
        let config = Config {
            log_filter: Some(String::from("runcell=[")),
            ..Config::default()
        };
        let first = initialise(&config);
        assert_eq!(initialise(&Config::default()), first);
    }
}
