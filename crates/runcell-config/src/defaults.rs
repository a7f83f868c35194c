//! Default values applied when a configuration layer leaves a field unset.

/// Default log filter expression used by the worker.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Program used to start the isolated runtime.
pub const DEFAULT_RUNTIME_PROGRAM: &str = "deno";

/// Package the isolated runtime executes to host the Python sandbox.
pub const DEFAULT_SANDBOX_PACKAGE: &str = "jsr:@eyurtsev/pyodide-sandbox@0.0.3";

/// Inherited descriptor carrying the framed request.
pub const DEFAULT_REQUEST_FD: i32 = 3;

/// Inherited descriptor receiving the framed response.
pub const DEFAULT_RESPONSE_FD: i32 = 4;

/// Default log filter expression used by the worker.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the worker.
pub fn default_log_format() -> crate::LogFormat {
    crate::LogFormat::Json
}
