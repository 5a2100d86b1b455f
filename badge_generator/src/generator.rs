//! The badge pipeline: version, build, tests, coverage, then persistence.

use serde::Serialize;
use tracing::info;

use crate::badge::{badge_url, BadgeSet};
use crate::build_check::{self, BuildStatus};
use crate::config::BadgeConfig;
use crate::coverage::{self, Coverage};
use crate::error::BadgeResult;
use crate::report::{self, BadgeData};
use crate::runner::CommandRunner;
use crate::testsuite::{self, TestResults};
use crate::version;

/// Everything a run observed, alongside the badges derived from it.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub version: String,
    pub build: BuildStatus,
    pub tests: TestResults,
    pub coverage: Coverage,
    pub badges: BadgeSet,
    pub readme_updated: bool,
}

pub struct BadgeGenerator<'a> {
    config: BadgeConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> BadgeGenerator<'a> {
    pub fn new(config: BadgeConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// Probes the project and builds the badges without writing anything.
    pub fn generate(&self) -> RunSummary {
        let root = self.config.root.as_path();

        let version = version::project_version(root);
        let build = build_check::check_build(root, self.runner);
        let tests = testsuite::run_tests(root, &self.config.tests_path(), self.runner);
        let coverage = coverage::calculate_coverage(&self.config, self.runner);

        let badges = build_badges(&version, build, &tests, &coverage);

        RunSummary {
            version,
            build,
            tests,
            coverage,
            badges,
            readme_updated: false,
        }
    }

    /// Full run: generate, save `data.json`, rewrite the README.
    pub fn run(&self) -> BadgeResult<RunSummary> {
        let mut summary = self.generate();

        let data = BadgeData {
            generated_at: report::timestamp(self.runner),
            badges: summary.badges.clone(),
        };
        report::save_badge_data(&self.config.data_path(), &data)?;
        summary.readme_updated = report::update_readme(&self.config.readme_path(), &summary.badges)?;

        info!(
            coverage_source = %summary.coverage.source,
            readme_updated = summary.readme_updated,
            "All badges generated"
        );
        Ok(summary)
    }
}

pub fn build_badges(
    version: &str,
    build: BuildStatus,
    tests: &TestResults,
    coverage: &Coverage,
) -> BadgeSet {
    BadgeSet {
        version: badge_url("version", &format!("v{}", version), "blue"),
        build: badge_url("build", build.as_str(), build.color()),
        tests: badge_url("tests", &tests.badge_message(), tests.status.color()),
        coverage: badge_url("coverage", &coverage.badge_message(), coverage.color()),
    }
}
