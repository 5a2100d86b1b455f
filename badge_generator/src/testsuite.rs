//! Test execution through Testament and result aggregation.
//!
//! Testament reports outcomes per test file, while the badge counts
//! individual `block:` sections. The two are combined heuristically: every
//! block is assumed to share the outcome of the whole run.

use std::fmt;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::runner::{CommandRunner, ToolCommand};
use crate::sources;

/// Pattern handed to `testament pattern`; Testament expands it itself.
pub const RUNNER_PATTERN: &str = "tests/t*.nim";

const PASS_MARKER: &str = "PASS:";
const COMPILE_MARKER: &str = ".nim c";
const FAIL_MARKER: &str = "FAIL:";

static ANSI_SGR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid ansi regex"));
static TEST_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^block:").expect("valid block regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TestStatus {
    #[default]
    #[serde(rename = "no tests")]
    NoTests,
    #[serde(rename = "passing")]
    Passing,
    #[serde(rename = "failing")]
    Failing,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoTests => "no tests",
            Self::Passing => "passing",
            Self::Failing => "failing",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Passing => "brightgreen",
            Self::Failing => "red",
            Self::NoTests => "lightgrey",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TestResults {
    pub status: TestStatus,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub test_functions: usize,
}

impl TestResults {
    /// Badge message: `"N tests"`, `"N tests (F failed)"` or `"no tests"`.
    pub fn badge_message(&self) -> String {
        if self.total == 0 {
            return "no tests".to_string();
        }
        match self.status {
            TestStatus::Failing => format!("{} tests ({} failed)", self.total, self.failed),
            _ => format!("{} tests", self.total),
        }
    }
}

/// File-level outcome counts scraped from runner output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileOutcomes {
    pub passed: usize,
    pub failed: usize,
}

pub fn strip_ansi(line: &str) -> std::borrow::Cow<'_, str> {
    ANSI_SGR.replace_all(line, "")
}

pub fn parse_runner_output(output: &str) -> FileOutcomes {
    let mut outcomes = FileOutcomes::default();
    for line in output.lines() {
        let clean = strip_ansi(line);
        if clean.contains(PASS_MARKER) && clean.contains(COMPILE_MARKER) {
            outcomes.passed += 1;
        } else if clean.contains(FAIL_MARKER) {
            outcomes.failed += 1;
        }
    }
    outcomes
}

pub fn count_test_blocks(source: &str) -> usize {
    TEST_BLOCK.find_iter(source).count()
}

/// Block count over every `t_*.nim` file in `tests_dir`. Unreadable files
/// are skipped.
pub fn count_suite_blocks(tests_dir: &Path) -> usize {
    sources::test_files(tests_dir)
        .iter()
        .filter_map(|path| match fs::read_to_string(path) {
            Ok(content) => Some(count_test_blocks(&content)),
            Err(err) => {
                debug!(file = %path.display(), error = %err, "Skipping unreadable test file");
                None
            }
        })
        .sum()
}

pub fn aggregate(exit_code: i32, outcomes: FileOutcomes, blocks: usize) -> TestResults {
    if exit_code != 0 {
        return TestResults {
            status: TestStatus::Failing,
            ..TestResults::default()
        };
    }

    if outcomes.passed > 0 && outcomes.failed == 0 {
        TestResults {
            status: TestStatus::Passing,
            passed: blocks,
            failed: 0,
            total: blocks,
            test_functions: blocks,
        }
    } else if outcomes.failed > 0 {
        TestResults {
            status: TestStatus::Failing,
            passed: 0,
            failed: blocks,
            total: blocks,
            test_functions: blocks,
        }
    } else {
        TestResults::default()
    }
}

pub fn run_tests(root: &Path, tests_dir: &Path, runner: &dyn CommandRunner) -> TestResults {
    info!("Running tests with Testament...");

    let command = ToolCommand::new("testament")
        .args(["pattern", RUNNER_PATTERN, "--print"])
        .current_dir(root);

    let output = match runner.run(&command) {
        Ok(output) => output,
        Err(err) => {
            warn!(error = %err, "Test runner could not run");
            return aggregate(-1, FileOutcomes::default(), 0);
        }
    };

    if !output.success() {
        warn!(exit_code = output.code, "Test runner reported failure");
        return aggregate(output.code, FileOutcomes::default(), 0);
    }

    let outcomes = parse_runner_output(&output.combined());
    let blocks = count_suite_blocks(tests_dir);
    debug!(
        passed_files = outcomes.passed,
        failed_files = outcomes.failed,
        blocks,
        "Parsed Testament output"
    );

    aggregate(output.code, outcomes, blocks)
}
