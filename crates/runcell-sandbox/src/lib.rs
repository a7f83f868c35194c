//! Out-of-process sandbox execution for runcell.
//!
//! Requests whose mode is `isolated` run in a separate runtime process that
//! hosts a Python interpreter compiled to WebAssembly. The runtime's own
//! permission system is the isolation boundary: this crate translates the
//! request's capability grants into runtime flags ([`RuntimePermissions`]),
//! wraps the user code in a fixed prelude and suffix
//! ([`assemble_sandbox_script`]), builds the command line
//! ([`SandboxInvocation`]), and supervises the process
//! ([`SandboxLauncher`]).
//!
//! ```rust,no_run
//! use runcell_protocol::ExecutionRequest;
//! use runcell_sandbox::{RuntimeCommand, SandboxLauncher};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let launcher = SandboxLauncher::new(RuntimeCommand::new(
//!     "deno",
//!     "jsr:@eyurtsev/pyodide-sandbox@0.0.3",
//! ));
//! let request = ExecutionRequest::new("def main(args):\n    return 42");
//! let result = launcher.launch(&request)?;
//! assert_eq!(result.result(), &serde_json::json!(42));
//! # Ok(()) }
//! ```

mod error;
pub mod invocation;
pub mod launcher;
pub mod permissions;
pub mod script;

#[cfg(test)]
mod tests;

pub use error::LaunchError;
pub use invocation::{RuntimeCommand, SandboxInvocation, v8_flags};
pub use launcher::SandboxLauncher;
pub use permissions::{DEFAULT_FILESYSTEM_ALLOW_LIST, RuntimePermissions};
pub use script::assemble_sandbox_script;
