//! The fixed set of builtins reachable from in-process scripts.
//!
//! [`CapabilityTable::standard`] starts from a raw engine, which has no
//! builtins, and registers the safe language packages plus the extension
//! builtins listed in [`EXTENSION_BUILTINS`]. Nothing else is reachable: there
//! is no filesystem module resolver, no `eval`, and no host I/O beyond `print`
//! and `debug`, which go to diagnostic logging.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use rhai::module_resolvers::StaticModuleResolver;
use rhai::packages::{
    BasicArrayPackage, BasicMapPackage, BasicMathPackage, CorePackage, LogicPackage,
    MoreStringPackage, Package,
};
use rhai::{Array, Dynamic, Engine, EvalAltResult, FLOAT, INT, Map, Module};
use tracing::{debug, info};

const SCRIPT_TARGET: &str = "runcell_interpreter::script";

/// Maximum nesting of script function calls.
pub const MAX_CALL_LEVELS: usize = 64;

/// Maximum expression nesting depth, at global level and inside functions.
pub const MAX_EXPR_DEPTH: usize = 64;

/// Builtins added on top of the safe language packages.
///
/// Modules are listed by the name scripts `import` them under.
pub const EXTENSION_BUILTINS: &[&str] = &[
    "import json",
    "import time",
    "import random",
    "json_encode",
    "json_decode",
    "now",
    "random",
    "random_int",
    "sleep",
    "dict",
    "list",
    "set",
    "print",
    "debug",
];

/// Immutable scripting engine configured with the restricted builtin set.
///
/// Build it once at start-up and share it by reference.
#[derive(Debug)]
pub struct CapabilityTable {
    engine: Engine,
}

impl CapabilityTable {
    /// Builds the standard table.
    #[must_use]
    pub fn standard() -> Self {
        let mut engine = Engine::new_raw();

        engine.register_global_module(CorePackage::new().as_shared_module());
        engine.register_global_module(LogicPackage::new().as_shared_module());
        engine.register_global_module(BasicMathPackage::new().as_shared_module());
        engine.register_global_module(MoreStringPackage::new().as_shared_module());
        engine.register_global_module(BasicArrayPackage::new().as_shared_module());
        engine.register_global_module(BasicMapPackage::new().as_shared_module());

        engine.set_module_resolver(extension_modules());
        register_extensions(&mut engine);

        engine.on_print(|text| info!(target: SCRIPT_TARGET, "{text}"));
        engine.on_debug(|text, source, position| {
            debug!(
                target: SCRIPT_TARGET,
                source = source.unwrap_or_default(),
                %position,
                "{text}"
            );
        });

        engine.disable_symbol("eval");
        engine.set_max_call_levels(MAX_CALL_LEVELS);
        engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_EXPR_DEPTH);

        Self { engine }
    }

    /// The configured engine.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::standard()
    }
}

type BuiltinResult<T> = Result<T, Box<EvalAltResult>>;

fn register_extensions(engine: &mut Engine) {
    engine
        .register_fn("json_encode", json_encode)
        .register_fn("json_decode", json_decode)
        .register_fn("now", now)
        .register_fn("random", random_float)
        .register_fn("random_int", random_int)
        .register_fn("sleep", sleep_seconds)
        .register_fn("sleep", sleep_whole_seconds)
        .register_fn("dict", Map::new)
        .register_fn("dict", |entries: Map| entries)
        .register_fn("list", Array::new)
        .register_fn("list", |items: Array| items)
        .register_fn("set", Array::new)
        .register_fn("set", distinct);
}

fn extension_modules() -> StaticModuleResolver {
    let mut json = Module::new();
    json.set_native_fn("encode", json_encode);
    json.set_native_fn("decode", json_decode);

    let mut time = Module::new();
    time.set_native_fn("now", now);
    time.set_native_fn("sleep", sleep_seconds);
    time.set_native_fn("sleep", sleep_whole_seconds);

    let mut random = Module::new();
    random.set_native_fn("float", random_float);
    random.set_native_fn("int", random_int);

    let mut resolver = StaticModuleResolver::new();
    resolver.insert("json", json);
    resolver.insert("time", time);
    resolver.insert("random", random);
    resolver
}

fn json_encode(value: Dynamic) -> BuiltinResult<String> {
    let json: serde_json::Value = rhai::serde::from_dynamic(&value)?;
    serde_json::to_string(&json).map_err(|err| format!("json_encode: {err}").into())
}

fn json_decode(text: &str) -> BuiltinResult<Dynamic> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|err| format!("json_decode: {err}"))?;
    rhai::serde::to_dynamic(json)
}

fn now() -> BuiltinResult<FLOAT> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .map_err(|err| format!("now: {err}").into())
}

fn random_float() -> BuiltinResult<FLOAT> {
    Ok(rand::random::<FLOAT>())
}

fn random_int(low: INT, high: INT) -> BuiltinResult<INT> {
    if low >= high {
        return Err(format!("random_int: empty range {low}..{high}").into());
    }
    Ok(rand::thread_rng().gen_range(low..high))
}

fn sleep_seconds(seconds: FLOAT) -> BuiltinResult<()> {
    let duration = Duration::try_from_secs_f64(seconds)
        .map_err(|err| format!("sleep: invalid duration {seconds}: {err}"))?;
    thread::sleep(duration);
    Ok(())
}

fn sleep_whole_seconds(seconds: INT) -> BuiltinResult<()> {
    let whole = u64::try_from(seconds).map_err(|_| format!("sleep: invalid duration {seconds}"))?;
    thread::sleep(Duration::from_secs(whole));
    Ok(())
}

/// Removes repeated items, keeping first occurrences. Items are compared by
/// their JSON form, so only data values can be deduplicated.
fn distinct(items: Array) -> BuiltinResult<Array> {
    let mut seen = Vec::with_capacity(items.len());
    let mut unique = Array::with_capacity(items.len());
    for item in items {
        let key: serde_json::Value = rhai::serde::from_dynamic(&item)?;
        if !seen.contains(&key) {
            seen.push(key);
            unique.push(item);
        }
    }
    Ok(unique)
}
