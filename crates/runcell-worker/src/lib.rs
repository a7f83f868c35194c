//! The runcell worker process.
//!
//! A host spawns one worker per execution and hands it two dedicated
//! channels. The worker reads a single request from the first, runs the code
//! either in-process under the restricted interpreter or in an isolated
//! sandbox runtime, writes a single response to the second, and exits:
//!
//! | Exit code | Meaning |
//! | --- | --- |
//! | 0 | a response was written (including `sandboxError` responses) |
//! | 1 | an in-process script failed; nothing was written |
//! | 2 | the worker could not answer (bad configuration or response channel) |
//!
//! Diagnostics go to stderr and are never part of the protocol.

pub mod bootstrap;
pub mod channels;
pub mod dispatch;
pub mod telemetry;

#[cfg(test)]
mod tests;

use runcell_interpreter::{CapabilityTable, RestrictedExecutor};
use runcell_sandbox::{RuntimeCommand, SandboxLauncher};

pub use self::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader, bootstrap_with};
pub use self::dispatch::{InProcessBackend, IsolatedBackend, Worker, WorkerOutcome};

/// Bootstraps the worker and handles its single request.
///
/// A request channel that cannot be bound is answered with a `sandboxError`
/// on the response channel.
///
/// # Errors
///
/// Returns [`BootstrapError`] when configuration fails to load or the
/// response channel cannot be bound, leaving nowhere to answer.
pub fn run(loader: &dyn ConfigLoader) -> Result<WorkerOutcome, BootstrapError> {
    let (config, bound_request, response) = bootstrap_with(loader)?.into_parts();
    let request = match bound_request {
        Ok(file) => file,
        Err(err) => {
            return Ok(dispatch::reject(
                response,
                &format!("failed to bind request channel: {err}"),
            ));
        }
    };

    let table = CapabilityTable::standard();
    let launcher = SandboxLauncher::new(RuntimeCommand::new(
        config.runtime_program(),
        config.sandbox_package(),
    ))
    .with_default_timeout(config.default_timeout());

    let worker = Worker::new(RestrictedExecutor::new(&table), launcher);
    Ok(worker.run(request, response))
}
