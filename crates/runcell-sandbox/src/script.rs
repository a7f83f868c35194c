//! Assembly of the program text handed to the sandbox runtime.
//!
//! User code is wrapped between a fixed prelude and suffix. The prelude
//! defines the `Args` and `Output` helpers and binds `args`; the suffix calls
//! the user's `main` and leaves its return value as the final expression so
//! the runtime reports it as the result.

use serde_json::Value;

const PRELUDE: &str = "\
import inspect as _runcell_inspect
import json as _runcell_json
import sys as _runcell_sys


class Args:
    def __init__(self, params):
        self.params = params


class Output(dict):
    pass


args = {}
";

const SUFFIX: &str = "

try:
    result = main(Args(args))
    if _runcell_inspect.isawaitable(result):
        result = await result
except Exception as _runcell_error:
    print(f\"{type(_runcell_error).__name__}: {_runcell_error}\", file=_runcell_sys.stderr)
    raise SystemExit(1)

result
";

/// Wraps `code` in the sandbox prelude and suffix.
///
/// When `params` is present it is encoded as JSON text, and that text is
/// embedded as an escaped string literal decoded at runtime, so no part of
/// `params` is ever spliced into the program unescaped.
///
/// # Errors
///
/// Returns the encoder error if `params` cannot be encoded.
pub fn assemble_sandbox_script(code: &str, params: Option<&Value>) -> Result<String, serde_json::Error> {
    let binding = params.map(params_binding).transpose()?;

    let mut script = String::with_capacity(
        PRELUDE.len() + SUFFIX.len() + code.len() + binding.as_ref().map_or(0, String::len) + 1,
    );
    script.push_str(PRELUDE);
    if let Some(line) = binding {
        script.push_str(&line);
    }
    script.push('\n');
    script.push_str(code);
    script.push_str(SUFFIX);
    Ok(script)
}

fn params_binding(params: &Value) -> Result<String, serde_json::Error> {
    let json_text = serde_json::to_string(params)?;
    // A JSON string literal is also a valid Python string literal.
    let literal = serde_json::to_string(&json_text)?;
    Ok(format!("args = _runcell_json.loads({literal})\n"))
}
