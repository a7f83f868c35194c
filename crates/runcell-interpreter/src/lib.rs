//! Restricted in-process script execution.
//!
//! Scripts run inside the worker on an embedded Rhai engine whose builtin set
//! is fixed at construction ([`CapabilityTable`]). This is namespace isolation
//! only: a script cannot name anything outside the table, but it shares the
//! worker's process, so it is not a boundary against resource exhaustion.
//!
//! ```
//! use runcell_interpreter::{CapabilityTable, RestrictedExecutor};
//! use serde_json::json;
//!
//! let table = CapabilityTable::standard();
//! let executor = RestrictedExecutor::new(&table);
//! let value = executor
//!     .execute("fn main(args) { #{ b: args.params.a + 1 } }", Some(&json!({"a": 1})))
//!     .expect("script runs");
//! assert_eq!(value, json!({"b": 2}));
//! ```

pub mod capabilities;
mod error;
pub mod executor;

pub use self::capabilities::{CapabilityTable, EXTENSION_BUILTINS};
pub use self::error::ScriptError;
pub use self::executor::{RestrictedExecutor, assemble_script};
