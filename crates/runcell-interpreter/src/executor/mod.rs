//! In-process execution of untrusted scripts.
//!
//! The user's script must define `fn main(args)`. The executor wraps it
//! between a prelude that defines the `Args` and `Output` helpers and a
//! suffix that calls `main(Args(host_params))`, where `host_params` is a
//! scope constant holding the request params. Params are bound as a value
//! and never spliced into source text.

use rhai::{Dynamic, Scope};
use serde_json::Value;
use tracing::debug;

use crate::capabilities::CapabilityTable;
use crate::error::ScriptError;

const EXECUTOR_TARGET: &str = "runcell_interpreter::executor";

/// Scope constant holding the request params.
pub const PARAMS_BINDING: &str = "host_params";

const PRELUDE: &str = "fn Args(params) { #{ params: params } } fn Output() { #{} }";

const SUFFIX: &str = "main(Args(host_params))";

/// Wraps `code` in the executor prelude and suffix.
#[must_use]
pub fn assemble_script(code: &str) -> String {
    format!("{PRELUDE}\n{code}\n{SUFFIX}\n")
}

/// Runs scripts against a [`CapabilityTable`].
#[derive(Debug)]
pub struct RestrictedExecutor<'table> {
    table: &'table CapabilityTable,
}

impl<'table> RestrictedExecutor<'table> {
    /// Creates an executor that borrows `table`.
    #[must_use]
    pub const fn new(table: &'table CapabilityTable) -> Self {
        Self { table }
    }

    /// Runs `code` and returns the value its `main` returned.
    ///
    /// Absent params bind as unit, which converts to JSON `null`.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError`] when the script fails to compile, raises, or
    /// returns a value with no JSON form.
    pub fn execute(&self, code: &str, params: Option<&Value>) -> Result<Value, ScriptError> {
        let engine = self.table.engine();
        let ast = engine.compile(assemble_script(code))?;

        let bound = match params {
            Some(value) => rhai::serde::to_dynamic(value)?,
            None => Dynamic::UNIT,
        };
        let mut scope = Scope::new();
        scope.push_constant_dynamic(PARAMS_BINDING, bound);

        debug!(target: EXECUTOR_TARGET, code_bytes = code.len(), "running script");
        let returned = engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast)?;
        let value = rhai::serde::from_dynamic::<Value>(&returned)?;
        debug!(target: EXECUTOR_TARGET, "script completed");
        Ok(value)
    }
}

#[cfg(test)]
mod tests;
