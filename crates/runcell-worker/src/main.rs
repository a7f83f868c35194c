//! Command-line entry point for the runcell worker.
//!
//! Configuration comes from defaults, `RUNCELL_*` environment variables and
//! command-line flags; see [`runcell_config::Config`].

use std::io::{self, Write};
use std::process::ExitCode;

use runcell_worker::{SystemConfigLoader, WorkerOutcome};

fn main() -> ExitCode {
    match runcell_worker::run(&SystemConfigLoader) {
        Ok(outcome) => outcome.into(),
        Err(error) => {
            // Nothing could be answered, and telemetry may not be installed.
            drop(writeln!(io::stderr(), "runcell-worker: {error}"));
            WorkerOutcome::ResponseFailed.into()
        }
    }
}
