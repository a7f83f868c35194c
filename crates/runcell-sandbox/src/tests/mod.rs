//! Crate-level launcher tests against fake runtimes.

use std::time::{Duration, Instant};

use rstest::{fixture, rstest};
use serde_json::json;

use runcell_protocol::{ExecutionConfig, ExecutionRequest, ExecutionStatus};

use crate::launcher::SandboxLauncher;

use self::support::FakeRuntimes;

mod support;

#[fixture]
fn runtimes() -> FakeRuntimes {
    FakeRuntimes::new()
}

#[rstest]
fn success_report_round_trips_session_metadata(runtimes: FakeRuntimes) {
    let launcher = SandboxLauncher::new(runtimes.reporting_success());
    let result = launcher
        .launch(&ExecutionRequest::new("def main(args):\n    return {'b': 2}"))
        .expect("launch runtime");

    assert_eq!(result.status(), ExecutionStatus::Success);
    assert_eq!(result.result(), &json!({ "b": 2 }));
    assert_eq!(
        result.session().metadata().and_then(|meta| meta.get("turn")),
        Some(&json!(1))
    );
    assert!(result.execution_time() >= 0.0);
}

#[rstest]
fn request_timeout_takes_precedence_over_default(runtimes: FakeRuntimes) {
    let launcher = SandboxLauncher::new(runtimes.sleeping())
        .with_default_timeout(Some(Duration::from_secs(60)));
    let request = ExecutionRequest::new("pass")
        .with_config(ExecutionConfig::default().with_timeout_seconds(0.2));

    let started = Instant::now();
    let result = launcher.launch(&request).expect("launch runtime");

    assert_eq!(result.status(), ExecutionStatus::Error);
    assert_eq!(result.stderr(), Some("Execution timed out after 0.2 seconds"));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(result.execution_time() >= 0.2);
}

#[rstest]
fn background_descendants_do_not_delay_an_unbounded_launch(runtimes: FakeRuntimes) {
    let launcher = SandboxLauncher::new(runtimes.leaving_background_process());

    let started = Instant::now();
    let result = launcher
        .launch(&ExecutionRequest::new("pass"))
        .expect("launch runtime");
    let waited = started.elapsed();

    assert_eq!(result.status(), ExecutionStatus::Success);
    assert!(waited < Duration::from_secs(5), "launch took {waited:?}");
    assert!(result.execution_time() <= waited.as_secs_f64());
}
