//! Toolchain health check.
//!
//! Reports which of the external programs the generator shells out to are
//! installed. Only `nim` and `testament` are required; the coverage tools
//! and `date` have fallbacks.

use serde::Serialize;

use crate::runner::CommandRunner;

struct Tool {
    name: &'static str,
    required: bool,
    fix: &'static str,
}

const TOOLS: [Tool; 5] = [
    Tool {
        name: "nim",
        required: true,
        fix: "Install Nim: https://nim-lang.org/install.html",
    },
    Tool {
        name: "testament",
        required: true,
        fix: "testament ships with Nim; make sure the Nim bin directory is on PATH",
    },
    Tool {
        name: "lcov",
        required: false,
        fix: "brew install lcov (macOS) or apt install lcov (Linux); coverage is estimated without it",
    },
    Tool {
        name: "genhtml",
        required: false,
        fix: "genhtml ships with lcov; HTML coverage reports are skipped without it",
    },
    Tool {
        name: "date",
        required: false,
        fix: "Install coreutils; timestamps are formatted internally without it",
    },
];

/// Result of a single health check
#[derive(Debug, Serialize, Clone)]
pub struct CheckResult {
    pub name: String,
    pub ok: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub status: String,
    pub checks: Vec<CheckResult>,
    pub issues_count: usize,
}

impl DoctorReport {
    /// A required tool is missing.
    pub fn has_blocking_issues(&self) -> bool {
        self.checks.iter().any(|c| c.required && !c.ok)
    }
}

pub fn run_checks(runner: &dyn CommandRunner) -> DoctorReport {
    let checks: Vec<CheckResult> = TOOLS
        .iter()
        .map(|tool| match runner.locate(tool.name) {
            Some(path) => CheckResult {
                name: tool.name.to_string(),
                ok: true,
                required: tool.required,
                path: Some(path.display().to_string()),
                fix: None,
            },
            None => CheckResult {
                name: tool.name.to_string(),
                ok: false,
                required: tool.required,
                path: None,
                fix: Some(tool.fix.to_string()),
            },
        })
        .collect();

    let issues_count = checks.iter().filter(|c| !c.ok).count();
    let status = if issues_count == 0 {
        "ok".to_string()
    } else {
        "issues_found".to_string()
    };

    DoctorReport {
        status,
        checks,
        issues_count,
    }
}

pub fn format_text(report: &DoctorReport) -> String {
    let mut output = String::new();
    output.push_str("Badge Generator Doctor\n");
    output.push_str("======================\n\n");

    for (title, required) in [("Required:", true), ("Optional:", false)] {
        output.push_str(title);
        output.push('\n');
        for check in report.checks.iter().filter(|c| c.required == required) {
            output.push_str(&format_check(check));
        }
        output.push('\n');
    }

    if report.issues_count == 0 {
        output.push_str("Status: All checks passed\n");
    } else {
        output.push_str(&format!(
            "Status: {} issue{} found\n",
            report.issues_count,
            if report.issues_count == 1 { "" } else { "s" }
        ));
    }
    output
}

fn format_check(check: &CheckResult) -> String {
    if check.ok {
        let path = check.path.as_deref().unwrap_or("found");
        format!("  \u{2713} {}: {}\n", check.name, path)
    } else {
        let mut line = format!("  \u{2717} {}: not found\n", check.name);
        if let Some(fix) = &check.fix {
            line.push_str(&format!("    \u{2192} {}\n", fix));
        }
        line
    }
}
