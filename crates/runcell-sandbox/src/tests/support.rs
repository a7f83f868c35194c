//! Fake runtimes for launcher tests.
//!
//! Each fake is a shell script run as `/bin/sh <script> <launcher args...>`,
//! so the launcher's real command line is exercised while the script ignores
//! its arguments.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::invocation::RuntimeCommand;

pub const PACKAGE: &str = "jsr:@eyurtsev/pyodide-sandbox@0.0.3";

pub const SUCCESS_REPORT: &str =
    r#"{"success":true,"result":{"b":2},"stdout":"","stderr":null,"sessionMetadata":{"turn":1}}"#;

/// Scratch directory holding fake runtime scripts.
pub struct FakeRuntimes {
    dir: TempDir,
}

impl FakeRuntimes {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to allocate temporary directory"),
        }
    }

    pub fn pid_file(&self) -> PathBuf {
        self.dir.path().join("runtime.pid")
    }

    /// A runtime that prints a fixed successful report.
    pub fn reporting_success(&self) -> RuntimeCommand {
        self.script("success.sh", &format!("printf '%s' '{SUCCESS_REPORT}'\n"))
    }

    /// A runtime that records its pid and then sleeps far past any test
    /// timeout.
    pub fn sleeping(&self) -> RuntimeCommand {
        let pid_file = self.pid_file();
        self.script(
            "sleep.sh",
            &format!("echo $$ > '{}'\nexec sleep 30\n", pid_file.display()),
        )
    }

    /// A runtime that prints a successful report but leaves a background
    /// sleeper holding its stdout, recording the sleeper's pid.
    pub fn leaving_background_process(&self) -> RuntimeCommand {
        let pid_file = self.pid_file();
        self.script(
            "background.sh",
            &format!(
                "sleep 30 &\necho $! > '{}'\nprintf '%s' '{SUCCESS_REPORT}'\n",
                pid_file.display()
            ),
        )
    }

    /// A runtime that writes only diagnostics and exits non-zero.
    pub fn failing_silently(&self) -> RuntimeCommand {
        self.script("fail.sh", "echo 'runtime exploded' >&2\nexit 3\n")
    }

    /// A runtime that writes something other than a report.
    pub fn printing_garbage(&self) -> RuntimeCommand {
        self.script("garbage.sh", "echo 'Traceback (most recent call last):'\n")
    }

    pub fn missing(&self) -> RuntimeCommand {
        RuntimeCommand::new(
            self.dir.path().join("no-such-runtime").display().to_string(),
            PACKAGE,
        )
    }

    fn script(&self, name: &str, body: &str) -> RuntimeCommand {
        let path = self.dir.path().join(name);
        write_fixture(&path, body);
        RuntimeCommand::new("/bin/sh", PACKAGE).with_runtime_args([path.display().to_string()])
    }
}

fn write_fixture(path: &Path, contents: &str) {
    fs::write(path, contents)
        .unwrap_or_else(|error| panic!("failed to write fixture {path:?}: {error}"));
}
