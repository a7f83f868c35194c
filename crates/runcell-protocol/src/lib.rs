//! Wire contract between a host application and the runcell worker.
//!
//! A host starts one worker process per execution. It writes a single
//! [`ExecutionRequest`] document to the worker's request channel and closes
//! it, then reads a single [`WorkerResponse`] document from the response
//! channel. Both channels are dedicated byte streams distinct from the
//! worker's stdout and stderr, which carry diagnostic logging only.
//!
//! Each channel carries exactly one message for the lifetime of the process,
//! so no length prefix or delimiter is needed: the reader consumes the stream
//! to end-of-file and decodes it as one JSON document.
//!
//! ```
//! use runcell_protocol::{ExecutionConfig, ExecutionMode, ExecutionRequest};
//! use serde_json::json;
//!
//! let request = ExecutionRequest::new("fn main(args) { args.params }")
//!     .with_params(json!({"a": 1}))
//!     .with_config(ExecutionConfig::default().with_mode(ExecutionMode::InProcess));
//!
//! let bytes = serde_json::to_vec(&request).expect("serialise request");
//! let decoded = runcell_protocol::read_request(bytes.as_slice()).expect("decode request");
//! assert_eq!(decoded, request);
//! ```

pub mod config;
pub mod error;
pub mod framing;
mod request;
pub mod response;

pub use self::config::{
    Capability, ExecutionConfig, ExecutionMode, Grant, NodeModulesDir, PermissionSpec,
    ResourceLimits, SessionState,
};
pub use self::error::{ConfigError, FrameError};
pub use self::framing::{read_reply, read_request, write_response};
pub use self::request::ExecutionRequest;
pub use self::response::{ExecutionResult, ExecutionStatus, WorkerResponse};
