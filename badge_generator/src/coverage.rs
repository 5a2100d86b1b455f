//! Code coverage measurement.
//!
//! Two mutually exclusive paths produce the percentage:
//! - **Measured**: test files are rebuilt with gcov instrumentation, executed,
//!   and the counters are captured and summarised with `lcov`.
//! - **Estimated**: when `lcov` is missing or capture fails, the ratio of test
//!   blocks to source procs/funcs is scaled and capped at 95%.
//!
//! The result always carries its [`CoverageSource`] so an estimate is never
//! mistaken for a measurement.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::BadgeConfig;
use crate::runner::{CommandRunner, ToolCommand};
use crate::sources;
use crate::testsuite::count_test_blocks;

pub const COVERAGE_INFO: &str = "coverage.info";
pub const FILTERED_INFO: &str = "coverage_src.info";
const SOURCE_FILTER: &str = "*/src/*";
const SUMMARY_LINES_LABEL: &str = "lines......:";

/// Scale applied to the blocks-per-function ratio.
const ESTIMATE_SCALE: f64 = 85.0;
/// Estimates never claim more than this.
pub const ESTIMATE_CAP: f64 = 95.0;

const NIM_COVERAGE_FLAGS: [&str; 5] = [
    "--debugger:native",
    "--passC:--coverage",
    "--passL:--coverage",
    "--verbosity:0",
    "--hints:off",
];

static PERCENTAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.?\d*)%").expect("valid percentage regex"));
static PROC_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*proc\s+\w+").expect("valid proc regex"));
static FUNC_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*func\s+\w+").expect("valid func regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageSource {
    Measured,
    Estimated,
}

impl fmt::Display for CoverageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measured => f.write_str("measured"),
            Self::Estimated => f.write_str("estimated"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coverage {
    pub percent: f64,
    pub source: CoverageSource,
}

impl Coverage {
    pub fn measured(percent: f64) -> Self {
        Self {
            percent,
            source: CoverageSource::Measured,
        }
    }

    pub fn estimated(percent: f64) -> Self {
        Self {
            percent,
            source: CoverageSource::Estimated,
        }
    }

    pub fn badge_message(&self) -> String {
        format!("{:.1}%", self.percent)
    }

    pub fn color(&self) -> &'static str {
        coverage_color(self.percent)
    }
}

pub fn coverage_color(percent: f64) -> &'static str {
    if percent >= 90.0 {
        "brightgreen"
    } else if percent >= 70.0 {
        "yellow"
    } else {
        "red"
    }
}

/// Line-coverage percentage from `lcov --summary` output.
///
/// ```text
///   lines......: 85.5% (123 of 144 lines)
/// ```
pub fn parse_lcov_summary(summary: &str) -> Option<f64> {
    summary
        .lines()
        .filter(|line| line.contains(SUMMARY_LINES_LABEL))
        .find_map(|line| {
            PERCENTAGE
                .captures(line)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
        })
}

pub fn count_source_functions(source: &str) -> usize {
    PROC_DECL.find_iter(source).count() + FUNC_DECL.find_iter(source).count()
}

pub fn estimate(test_blocks: usize, source_functions: usize) -> f64 {
    if source_functions == 0 {
        return 0.0;
    }
    let ratio = test_blocks as f64 / source_functions as f64;
    (ratio * ESTIMATE_SCALE).min(ESTIMATE_CAP)
}

/// Test blocks and source declarations found in the project tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceCensus {
    pub test_blocks: usize,
    pub source_functions: usize,
}

/// Walks every `*.nim` file: `t_*` files under the tests directory count
/// blocks, files outside it without `test` in their name count declarations.
pub fn census(config: &BadgeConfig) -> SourceCensus {
    let tests_dir = config.tests_path();
    let mut census = SourceCensus::default();

    for relative in sources::nim_files(&config.root) {
        let path = config.root.join(&relative);
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let in_tests = path.starts_with(&tests_dir);

        let counter: fn(&str) -> usize = if in_tests && name.starts_with("t_") {
            count_test_blocks
        } else if !(in_tests || name.to_lowercase().contains("test")) {
            count_source_functions
        } else {
            continue;
        };

        match fs::read_to_string(&path) {
            Ok(content) => {
                let count = counter(&content);
                if in_tests {
                    census.test_blocks += count;
                } else {
                    census.source_functions += count;
                }
            }
            Err(err) => {
                debug!(file = %path.display(), error = %err, "Skipping unreadable source file");
            }
        }
    }

    census
}

pub fn estimate_coverage(config: &BadgeConfig) -> Coverage {
    info!("Using fallback coverage estimation...");

    let census = census(config);
    let percent = estimate(census.test_blocks, census.source_functions);
    info!(
        test_blocks = census.test_blocks,
        source_functions = census.source_functions,
        "Estimated coverage: {:.1}%",
        percent
    );
    Coverage::estimated(percent)
}

pub fn calculate_coverage(config: &BadgeConfig, runner: &dyn CommandRunner) -> Coverage {
    info!("Calculating code coverage...");

    if !runner.is_available("lcov") {
        warn!("lcov not found, using fallback estimation");
        return estimate_coverage(config);
    }

    match measure_coverage(config, runner) {
        Some(percent) => {
            info!("Code coverage: {:.1}%", percent);
            Coverage::measured(percent)
        }
        None => {
            warn!("Could not capture coverage data, using fallback estimation");
            estimate_coverage(config)
        }
    }
}

fn measure_coverage(config: &BadgeConfig, runner: &dyn CommandRunner) -> Option<f64> {
    let root = config.root.as_path();

    reset_counters(config, runner);

    let test_files = sources::test_files(&config.tests_path());
    info!(files = test_files.len(), "Compiling tests with coverage...");
    for test_file in &test_files {
        let command = ToolCommand::new("nim")
            .arg("c")
            .args(NIM_COVERAGE_FLAGS)
            .path_arg(test_file)
            .current_dir(root);
        match runner.run(&command) {
            Ok(output) if output.success() => {}
            _ => warn!(file = %test_file.display(), "Failed to compile test with coverage"),
        }
    }

    info!("Running compiled tests to generate coverage data...");
    for test_file in &test_files {
        let executable = test_file.with_extension("");
        if executable.is_file() {
            let command = ToolCommand::new(executable.display().to_string()).current_dir(root);
            if let Err(err) = runner.run(&command) {
                debug!(binary = %executable.display(), error = %err, "Test binary did not start");
            }
        }
    }

    let percent = capture_and_summarize(config, runner);

    if percent.is_some() && config.coverage_report {
        generate_html_report(config, runner);
    }

    remove_intermediates(root);
    let removed = remove_test_executables(&config.tests_path());
    debug!(removed, "Cleaned up test executables");

    percent
}

fn reset_counters(config: &BadgeConfig, runner: &dyn CommandRunner) {
    let nim_cache = config.nim_cache_path();
    let removed = remove_gcda_files(&config.root) + remove_gcda_files(&nim_cache);
    debug!(removed, "Removed stale .gcda files");

    for dir in [config.root.as_path(), nim_cache.as_path()] {
        let command = ToolCommand::new("lcov")
            .args(["--zerocounters", "--directory"])
            .path_arg(dir)
            .current_dir(&config.root);
        let _ = runner.run(&command);
    }
}

fn capture_and_summarize(config: &BadgeConfig, runner: &dyn CommandRunner) -> Option<f64> {
    let root = config.root.as_path();

    let capture = ToolCommand::new("lcov")
        .args(["--capture", "--directory"])
        .path_arg(&config.nim_cache_path())
        .args(["--output-file", COVERAGE_INFO])
        .current_dir(root);
    let captured = runner.run(&capture).map_or(false, |o| o.success());
    if !captured || !root.join(COVERAGE_INFO).is_file() {
        return None;
    }

    let extract = ToolCommand::new("lcov")
        .args(["--extract", COVERAGE_INFO, SOURCE_FILTER])
        .args(["--output-file", FILTERED_INFO])
        .current_dir(root);
    if let Ok(output) = runner.run(&extract) {
        if !output.success() {
            warn!(stderr = %output.stderr.trim(), "lcov --extract failed");
        }
    }

    let summary = ToolCommand::new("lcov")
        .args(["--summary", FILTERED_INFO])
        .current_dir(root);
    match runner.run(&summary) {
        // lcov prints the summary on stderr in some releases.
        Ok(output) if output.success() => parse_lcov_summary(&output.combined()),
        Ok(output) => {
            warn!(stderr = %output.stderr.trim(), "lcov --summary failed");
            None
        }
        Err(err) => {
            warn!(error = %err, "lcov --summary could not run");
            None
        }
    }
}

fn generate_html_report(config: &BadgeConfig, runner: &dyn CommandRunner) {
    info!("Generating detailed HTML coverage report...");

    let html_dir = config.html_path();
    if html_dir.exists() {
        if let Err(err) = fs::remove_dir_all(&html_dir) {
            debug!(dir = %html_dir.display(), error = %err, "Failed to remove old report");
        }
    }

    let title = format!("{} Source Code Coverage", config.project_name());
    let command = ToolCommand::new("genhtml")
        .arg(FILTERED_INFO)
        .arg("--output-directory")
        .path_arg(&html_dir)
        .args(["--title", title.as_str(), "--no-function-coverage"])
        .current_dir(&config.root);

    match runner.run(&command) {
        Ok(output) if output.success() && html_dir.join("index.html").is_file() => {
            info!(report = %html_dir.join("index.html").display(), "HTML coverage report generated");
        }
        Ok(output) => {
            warn!(stderr = %output.stderr.trim(), "Failed to generate HTML coverage report");
        }
        Err(err) => {
            warn!(error = %err, "Failed to generate HTML coverage report");
        }
    }
}

fn remove_gcda_files(dir: &Path) -> usize {
    if !dir.is_dir() {
        return 0;
    }
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "gcda"))
        .filter(|e| fs::remove_file(e.path()).is_ok())
        .count()
}

fn remove_intermediates(root: &Path) -> usize {
    [COVERAGE_INFO, FILTERED_INFO]
        .iter()
        .map(|name| root.join(name))
        .filter(|path| fs::remove_file(path).is_ok())
        .count()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).map_or(false, |m| m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "exe")
}

/// Compiled test binaries left next to their sources.
fn test_executables(tests_dir: &Path) -> Vec<PathBuf> {
    if !tests_dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(tests_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map_or(true, |ext| ext != sources::NIM_EXTENSION))
        .filter(|e| is_executable(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect()
}

fn remove_test_executables(tests_dir: &Path) -> usize {
    test_executables(tests_dir)
        .iter()
        .filter(|path| fs::remove_file(path).is_ok())
        .count()
}

/// What `clean` removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CleanReport {
    pub gcda_files: usize,
    pub intermediate_files: usize,
    pub test_executables: usize,
    pub html_report: bool,
}

/// Best-effort removal of every artifact a coverage run can leave behind.
pub fn clean_artifacts(config: &BadgeConfig) -> CleanReport {
    let html_dir = config.html_path();
    let html_report = html_dir.is_dir() && fs::remove_dir_all(&html_dir).is_ok();

    CleanReport {
        gcda_files: remove_gcda_files(&config.root) + remove_gcda_files(&config.nim_cache_path()),
        intermediate_files: remove_intermediates(&config.root),
        test_executables: remove_test_executables(&config.tests_path()),
        html_report,
    }
}
