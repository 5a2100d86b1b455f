//! Badge generator command line interface
//!
//! # Commands
//!
//! - `badge_generator generate` - Probe the project and rewrite badges (default)
//! - `badge_generator doctor` - Check that the external tools are installed
//! - `badge_generator clean` - Remove coverage artifacts

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use badge_generator::config::GenerateArgs;
use badge_generator::{coverage, doctor, BadgeConfig, BadgeGenerator, RunSummary, SystemRunner};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// Generate version, build, test and coverage badges for a Nim project.
#[derive(Parser)]
#[command(name = "badge_generator")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project root directory
    #[arg(long, global = true, value_name = "PATH", env = "BADGES_ROOT", default_value = ".")]
    root: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate all badges, save badges/data.json and update README.md
    Generate {
        #[command(flatten)]
        args: GenerateArgs,

        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check that nim, testament and the coverage tools are installed
    Doctor {
        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove coverage counters, reports and compiled test binaries
    Clean {
        #[command(flatten)]
        args: GenerateArgs,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let action = failed_action(cli.command.as_ref());
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error {}: {:#}", action, err);
            ExitCode::FAILURE
        }
    }
}

/// What the command was doing, for the error line.
fn failed_action(command: Option<&Commands>) -> &'static str {
    match command {
        None | Some(Commands::Generate { .. }) => "generating badges",
        Some(Commands::Doctor { .. }) => "running doctor",
        Some(Commands::Clean { .. }) => "cleaning coverage data",
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        None => generate(BadgeConfig::new(cli.root), "text"),
        Some(Commands::Generate { args, format }) => {
            generate(BadgeConfig::from_args(cli.root, args), &format)
        }
        Some(Commands::Doctor { format }) => run_doctor(&format),
        Some(Commands::Clean { args }) => clean(BadgeConfig::from_args(cli.root, args)),
    }
}

fn generate(config: BadgeConfig, format: &str) -> anyhow::Result<ExitCode> {
    let runner = SystemRunner;
    let summary = BadgeGenerator::new(config, &runner)
        .run()
        .context("failed to write badge outputs")?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &RunSummary) {
    println!("\nAll badges generated successfully!");
    println!("\nGenerated badges:");
    for (name, url) in summary.badges.iter() {
        println!("  {}: {}", name, url);
    }
    println!(
        "\nCoverage: {:.1}% ({})",
        summary.coverage.percent, summary.coverage.source
    );
    if !summary.readme_updated {
        println!("README not found, badge links were not updated");
    }
}

fn run_doctor(format: &str) -> anyhow::Result<ExitCode> {
    let report = doctor::run_checks(&SystemRunner);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", doctor::format_text(&report));
    }

    if report.has_blocking_issues() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn clean(config: BadgeConfig) -> anyhow::Result<ExitCode> {
    println!("Cleaning coverage data...");
    let report = coverage::clean_artifacts(&config);
    println!(
        "Removed {} .gcda files, {} tracefiles, {} test executables{}",
        report.gcda_files,
        report.intermediate_files,
        report.test_executables,
        if report.html_report {
            " and the HTML report"
        } else {
            ""
        }
    );
    Ok(ExitCode::SUCCESS)
}
