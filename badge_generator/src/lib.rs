//! Status badge generation for Nim projects.
//!
//! The generator probes a project with its own toolchain and turns the
//! results into shields.io badge URLs:
//!
//! - **version** from the `.nimble` manifest
//! - **build** from `nim check` on the entry file
//! - **tests** from `testament` output and `block:` counts
//! - **coverage** from `lcov`, or a heuristic estimate when it is missing
//!
//! The URLs are written to `badges/data.json` and swapped into the badge
//! links of `README.md`. Every step degrades to a conservative default
//! rather than failing; only writing the outputs can abort a run.

pub mod badge;
pub mod build_check;
pub mod config;
pub mod coverage;
pub mod doctor;
pub mod error;
pub mod generator;
pub mod report;
pub mod runner;
pub mod sources;
pub mod testsuite;
pub mod version;

pub use badge::{badge_url, BadgeSet};
pub use build_check::BuildStatus;
pub use config::BadgeConfig;
pub use coverage::{Coverage, CoverageSource};
pub use error::{BadgeError, BadgeResult};
pub use generator::{BadgeGenerator, RunSummary};
pub use report::BadgeData;
pub use runner::{CommandOutput, CommandRunner, SystemRunner, ToolCommand};
pub use testsuite::{TestResults, TestStatus};
