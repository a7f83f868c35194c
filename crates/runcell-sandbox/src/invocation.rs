//! Command-line construction for the sandbox runtime.

use std::ffi::OsStr;
use std::process::Command;

use runcell_protocol::{ExecutionRequest, ResourceLimits};

use crate::error::LaunchError;
use crate::permissions::RuntimePermissions;
use crate::script::assemble_sandbox_script;

/// The runtime program, its leading arguments and the sandbox package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeCommand {
    program: String,
    runtime_args: Vec<String>,
    package: String,
}

impl RuntimeCommand {
    /// Creates a command that runs `package` with `program run`.
    pub fn new(program: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            runtime_args: vec![String::from("run")],
            package: package.into(),
        }
    }

    /// Replaces the arguments placed between the program and the permission
    /// flags.
    #[must_use]
    pub fn with_runtime_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runtime_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Program that starts the runtime.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Sandbox package identifier.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }
}

/// A fully resolved runtime invocation for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxInvocation {
    program: String,
    args: Vec<String>,
}

impl SandboxInvocation {
    /// Resolves the invocation for `request` under `limits`.
    ///
    /// Arguments are, in order: the runtime arguments, the permission flags,
    /// the heap limit flags when a memory limit is set, the package, the
    /// program text, and the optional session arguments.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Assembly`] when the params cannot be encoded.
    pub fn build(
        runtime: &RuntimeCommand,
        request: &ExecutionRequest,
        limits: &ResourceLimits,
    ) -> Result<Self, LaunchError> {
        let config = request.config();
        let mut args = runtime.runtime_args.clone();
        args.extend(
            RuntimePermissions::from_spec(&config.permissions(), config.node_modules_dir())
                .into_flags(),
        );
        if let Some(megabytes) = limits.memory_limit_mb() {
            args.push(v8_flags(megabytes));
        }
        args.push(runtime.package.clone());

        args.push(String::from("-c"));
        args.push(assemble_sandbox_script(request.code(), request.params())?);

        if config.is_stateful() {
            args.push(String::from("-s"));
        }
        // Empty session parts carry no state and are left off.
        let session = config.session();
        if let Some(bytes) = session.bytes().filter(|bytes| !bytes.is_empty()) {
            args.push(String::from("-b"));
            args.push(serde_json::to_string(bytes)?);
        }
        if let Some(metadata) = session.metadata().filter(|metadata| !metadata.is_empty()) {
            args.push(String::from("-m"));
            args.push(serde_json::to_string(metadata)?);
        }

        Ok(Self {
            program: runtime.program.clone(),
            args,
        })
    }

    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments in invocation order.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns a [`Command`] for this invocation with no stdio configured.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.args.iter().map(OsStr::new));
        command
    }
}

/// Heap limit flags passed through to the runtime's JavaScript engine.
#[must_use]
pub fn v8_flags(memory_limit_mb: u32) -> String {
    format!("--v8-flags=--max-old-space-size={memory_limit_mb},--no-wasm-trap-handler")
}
