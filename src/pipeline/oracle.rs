//! Test oracle
//!
//! Runs the project's test suite and reports how many tests fail. The
//! pipeline compares that number against the baseline taken before any
//! edit; it never looks at which tests fail.

use super::process::run_tool;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Exit code pytest uses when no tests were collected
const PYTEST_NO_TESTS: i32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleOutcome {
    Completed { failures: usize },
    TimedOut,
    Unavailable(String),
}

pub trait TestOracle: Send + Sync {
    fn run(&self) -> OracleOutcome;
}

static FAILURE_COUNT: OnceLock<Regex> = OnceLock::new();

fn failure_count() -> &'static Regex {
    FAILURE_COUNT.get_or_init(|| {
        Regex::new(r"\b(\d+) (failed|errors?)\b").expect("valid regex")
    })
}

/// Sum of `N failed` and `N error(s)` in a pytest-style summary line
pub fn parse_failure_count(output: &str) -> Option<usize> {
    let mut found = false;
    let mut total = 0usize;
    for caps in failure_count().captures_iter(output) {
        if let Some(n) = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) {
            found = true;
            total += n;
        }
    }
    found.then_some(total)
}

/// Runs a configured test command in the project root
pub struct CommandTestOracle {
    root: PathBuf,
    command: Vec<String>,
    timeout_secs: u64,
}

impl CommandTestOracle {
    pub fn new(root: impl Into<PathBuf>, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            root: root.into(),
            command,
            timeout_secs,
        }
    }
}

impl TestOracle for CommandTestOracle {
    fn run(&self) -> OracleOutcome {
        let output = run_tool(&self.command, "test suite", self.timeout_secs, &self.root);
        if output.timed_out {
            return OracleOutcome::TimedOut;
        }
        if !output.success {
            let reason = output.error.unwrap_or_else(|| "test command failed".to_string());
            warn!("Test oracle unavailable: {}", reason);
            return OracleOutcome::Unavailable(reason);
        }

        let code = output.return_code.unwrap_or(-1);
        // pytest prints its summary last; only the tail is worth scanning
        let combined = output.combined();
        let tail: String = combined
            .lines()
            .rev()
            .take(20)
            .collect::<Vec<_>>()
            .join("\n");
        match parse_failure_count(&tail) {
            Some(failures) => {
                debug!("Test suite finished with {} failures", failures);
                OracleOutcome::Completed { failures }
            }
            None if code == 0 || code == PYTEST_NO_TESTS => OracleOutcome::Completed { failures: 0 },
            None => OracleOutcome::Unavailable(format!(
                "test command exited with {} without a failure summary",
                code
            )),
        }
    }
}
