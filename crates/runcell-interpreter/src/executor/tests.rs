//! Unit tests for in-process script execution.

use rstest::{fixture, rstest};
use serde_json::json;

use super::*;

#[fixture]
fn table() -> CapabilityTable {
    CapabilityTable::standard()
}

#[rstest]
fn main_receives_params(table: CapabilityTable) {
    let executor = RestrictedExecutor::new(&table);
    let value = executor
        .execute("fn main(args) { #{ b: args.params.a + 1 } }", Some(&json!({ "a": 1 })))
        .expect("script runs");
    assert_eq!(value, json!({ "b": 2 }));
}

#[rstest]
fn absent_params_bind_as_null(table: CapabilityTable) {
    let executor = RestrictedExecutor::new(&table);
    let value = executor
        .execute("fn main(args) { args.params }", None)
        .expect("script runs");
    assert_eq!(value, Value::Null);
}

#[rstest]
fn output_helper_builds_a_map(table: CapabilityTable) {
    let executor = RestrictedExecutor::new(&table);
    let script = r#"
        fn main(args) {
            let out = Output();
            out.names = args.params.map(|n| n.to_upper());
            out
        }
    "#;
    let value = executor
        .execute(script, Some(&json!(["ada", "grace"])))
        .expect("script runs");
    assert_eq!(value, json!({ "names": ["ADA", "GRACE"] }));
}

#[rstest]
fn params_cannot_escape_into_source(table: CapabilityTable) {
    let executor = RestrictedExecutor::new(&table);
    let hostile = json!("\" } fn main(args) { 666 } //");
    let value = executor
        .execute("fn main(args) { args.params }", Some(&hostile))
        .expect("script runs");
    assert_eq!(value, hostile);
}

#[rstest]
fn thrown_values_are_runtime_errors(table: CapabilityTable) {
    let executor = RestrictedExecutor::new(&table);
    let error = executor
        .execute(r#"fn main(args) { throw "boom" }"#, None)
        .expect_err("script should fail");
    assert_eq!(error.kind(), "RuntimeError");
    assert_eq!(error.message(), "boom");
    assert_eq!(error.to_string(), "RuntimeError: boom");
}

#[rstest]
#[case::syntax("fn main(args) { let }", "SyntaxError")]
#[case::missing_main("fn helper() { 1 }", "FunctionNotFound")]
#[case::unknown_function("fn main(args) { open_file(\"/etc/passwd\") }", "FunctionNotFound")]
#[case::division("fn main(args) { 1 / 0 }", "ArithmeticError")]
#[case::bounds("fn main(args) { [1][5] }", "IndexError")]
fn failures_are_classified(table: CapabilityTable, #[case] code: &str, #[case] kind: &str) {
    let executor = RestrictedExecutor::new(&table);
    let error = executor.execute(code, None).expect_err("script should fail");
    assert_eq!(error.kind(), kind, "{error}");
    assert!(!error.message().is_empty());
}

#[rstest]
fn executor_is_reusable_across_scripts(table: CapabilityTable) {
    let executor = RestrictedExecutor::new(&table);
    let first = executor.execute("fn main(args) { 1 }", None).expect("first run");
    let second = executor.execute("fn main(args) { 2 }", None).expect("second run");
    assert_eq!((first, second), (json!(1), json!(2)));
}

#[test]
fn assembled_script_ends_with_main_call() {
    let script = assemble_script("fn main(args) { 0 }");
    assert!(script.starts_with(PRELUDE));
    assert!(script.trim_end().ends_with(SUFFIX));
    assert!(script.contains("fn main(args) { 0 }"));
}
