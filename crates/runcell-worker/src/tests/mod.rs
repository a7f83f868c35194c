//! Dispatch tests with backend doubles.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use mockall::mock;
use mockall::predicate::always;
use ortho_config::{OrthoConfig, OrthoError};
use rstest::rstest;
use serde_json::{Value, json};
use tempfile::TempDir;

use runcell_config::Config;
use runcell_interpreter::ScriptError;
use runcell_protocol::{ExecutionRequest, ExecutionResult};
use runcell_sandbox::LaunchError;

use crate::bootstrap::{BootstrapError, ConfigLoader, bootstrap_with};
use crate::dispatch::{self, InProcessBackend, IsolatedBackend, Worker, WorkerOutcome};

mock! {
    InProcess {}
    impl InProcessBackend for InProcess {
        fn execute(&self, request: &ExecutionRequest) -> Result<Value, ScriptError>;
    }
}

mock! {
    Isolated {}
    impl IsolatedBackend for Isolated {
        fn launch(&self, request: &ExecutionRequest) -> Result<ExecutionResult, LaunchError>;
    }
}

mock! {
    Loader {}
    impl ConfigLoader for Loader {
        fn load(&self) -> Result<Config, Arc<OrthoError>>;
    }
}

fn in_process_returning(result: Result<Value, ScriptError>) -> MockInProcess {
    let mut backend = MockInProcess::new();
    backend
        .expect_execute()
        .with(always())
        .once()
        .return_once(move |_| result);
    backend
}

fn isolated_returning(result: Result<ExecutionResult, LaunchError>) -> MockIsolated {
    let mut backend = MockIsolated::new();
    backend.expect_launch().once().return_once(move |_| result);
    backend
}

fn run(worker: &Worker<MockInProcess, MockIsolated>, request: &[u8]) -> (WorkerOutcome, String) {
    let mut response = Vec::new();
    let outcome = worker.run(request, &mut response);
    let text = String::from_utf8(response).expect("response is utf-8");
    (outcome, text)
}

struct BrokenChannel;

impl io::Write for BrokenChannel {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "host closed channel"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[rstest]
#[case::garbage(b"not json".as_slice())]
#[case::empty(b"".as_slice())]
#[case::bad_config(br#"{"code":"x","config":{"allow_net":"yes"}}"#.as_slice())]
#[case::unknown_mode(br#"{"code":"x","config":{"mode":"remote"}}"#.as_slice())]
fn protocol_failures_become_sandbox_errors(#[case] request: &[u8]) {
    let worker = Worker::new(MockInProcess::new(), MockIsolated::new());
    let (outcome, text) = run(&worker, request);

    assert_eq!(outcome, WorkerOutcome::Responded);
    assert_eq!(outcome.exit_code(), 0);
    let response: Value = serde_json::from_str(&text).expect("response is JSON");
    assert!(response.get("sandboxError").and_then(Value::as_str).is_some(), "{text}");
    assert!(text.ends_with('\n'));
}

#[test]
fn in_process_value_is_written_literally() {
    let worker = Worker::new(in_process_returning(Ok(json!({ "b": 2 }))), MockIsolated::new());
    let (outcome, text) = run(
        &worker,
        br#"{"code":"fn main(args) { #{ b: args.params.a + 1 } }","params":{"a":1},"config":{"mode":"in_process"}}"#,
    );

    assert_eq!(outcome, WorkerOutcome::Responded);
    assert_eq!(text, "{\"b\":2}\n");
}

#[test]
fn in_process_failure_writes_nothing() {
    let worker = Worker::new(
        in_process_returning(Err(ScriptError::new("RuntimeError", "boom"))),
        MockIsolated::new(),
    );
    let (outcome, text) = run(&worker, br#"{"code":"x","config":{"mode":"in_process"}}"#);

    assert_eq!(outcome, WorkerOutcome::ScriptFailed);
    assert_eq!(outcome.exit_code(), 1);
    assert!(text.is_empty());
}

#[test]
fn isolated_is_the_default_mode() {
    let result = ExecutionResult::success(json!(42)).with_execution_time(0.5);
    let worker = Worker::new(MockInProcess::new(), isolated_returning(Ok(result)));
    let (outcome, text) = run(&worker, br#"{"code":"def main(args): return 42"}"#);

    assert_eq!(outcome, WorkerOutcome::Responded);
    let response: Value = serde_json::from_str(&text).expect("response is JSON");
    assert_eq!(response["status"], json!("success"));
    assert_eq!(response["result"], json!(42));
    assert_eq!(response["execution_time"], json!(0.5));
}

#[test]
fn isolated_script_errors_are_results_not_failures() {
    let result = ExecutionResult::error().with_stderr(Some("ValueError: nope".to_owned()));
    let worker = Worker::new(MockInProcess::new(), isolated_returning(Ok(result)));
    let (outcome, text) = run(&worker, br#"{"code":"x","config":{"mode":"isolated"}}"#);

    assert_eq!(outcome, WorkerOutcome::Responded);
    let response: Value = serde_json::from_str(&text).expect("response is JSON");
    assert_eq!(response["status"], json!("error"));
    assert_eq!(response["result"], Value::Null);
    assert_eq!(response["stderr"], json!("ValueError: nope"));
}

#[test]
fn launch_failures_become_sandbox_errors() {
    let failure = LaunchError::MalformedOutput {
        message: String::from("expected value at line 1 column 1"),
        source: None,
    };
    let worker = Worker::new(MockInProcess::new(), isolated_returning(Err(failure)));
    let (outcome, text) = run(&worker, br#"{"code":"x"}"#);

    assert_eq!(outcome, WorkerOutcome::Responded);
    let response: Value = serde_json::from_str(&text).expect("response is JSON");
    let message = response["sandboxError"].as_str().expect("sandboxError message");
    assert!(message.contains("malformed output"), "{message}");
}

#[test]
fn unwritable_response_channel_is_reported() {
    let worker = Worker::new(in_process_returning(Ok(Value::Null)), MockIsolated::new());
    let outcome = worker.run(
        br#"{"code":"x","config":{"mode":"in_process"}}"#.as_slice(),
        BrokenChannel,
    );
    assert_eq!(outcome, WorkerOutcome::ResponseFailed);
    assert_eq!(outcome.exit_code(), 2);
}

#[test]
fn configuration_failures_stop_bootstrap() {
    let mut loader = MockLoader::new();
    loader.expect_load().once().returning(|| {
        Config::load_from_iter(["runcell-worker", "--request-fd", "not-a-number"].map(OsString::from))
    });

    let error = bootstrap_with(&loader).expect_err("bootstrap should fail");
    assert!(matches!(error, BootstrapError::Configuration { .. }));
}

fn loader_with_channels(request: &Path, response: &Path) -> MockLoader {
    let args = [
        OsString::from("runcell-worker"),
        OsString::from("--request-path"),
        request.as_os_str().to_owned(),
        OsString::from("--response-path"),
        response.as_os_str().to_owned(),
    ];
    let mut loader = MockLoader::new();
    loader
        .expect_load()
        .once()
        .return_once(move || Config::load_from_iter(args));
    loader
}

#[test]
fn unbound_request_channel_is_answered_with_sandbox_error() {
    let dir = TempDir::new().expect("failed to allocate temporary directory");
    let response = dir.path().join("response.json");
    let loader = loader_with_channels(&dir.path().join("absent.json"), &response);

    let outcome = crate::run(&loader).expect("worker should answer");

    assert_eq!(outcome, WorkerOutcome::Responded);
    let text = fs::read_to_string(&response).expect("read response");
    let answer: Value = serde_json::from_str(&text).expect("response is JSON");
    let message = answer["sandboxError"].as_str().expect("sandboxError message");
    assert!(message.contains("absent.json"), "{message}");
}

#[test]
fn response_channel_is_bound_before_the_request_channel() {
    let dir = TempDir::new().expect("failed to allocate temporary directory");
    let loader = loader_with_channels(
        &dir.path().join("absent.json"),
        &dir.path().join("response.json"),
    );

    let bootstrapped = bootstrap_with(&loader).expect("response channel binds");
    let (_, request, _) = bootstrapped.into_parts();
    assert!(request.is_err());
}

#[test]
fn unbound_response_channel_stops_bootstrap() {
    let dir = TempDir::new().expect("failed to allocate temporary directory");
    let request = dir.path().join("request.json");
    fs::write(&request, "{}").expect("write request");
    let loader = loader_with_channels(&request, &dir.path().join("missing").join("response.json"));

    let error = bootstrap_with(&loader).expect_err("bootstrap should fail");
    assert!(matches!(error, BootstrapError::Channel { .. }));
}

#[test]
fn reject_frames_a_sandbox_error() {
    let mut response = Vec::new();
    let outcome = dispatch::reject(&mut response, "failed to bind request channel: gone");

    assert_eq!(outcome, WorkerOutcome::Responded);
    let answer: Value = serde_json::from_slice(&response).expect("response is JSON");
    assert_eq!(
        answer,
        json!({ "sandboxError": "failed to bind request channel: gone" })
    );
}
