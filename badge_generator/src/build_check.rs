//! Build status via `nim check`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::runner::{CommandRunner, ToolCommand};
use crate::sources;

const ENTRY_CANDIDATES: [&str; 2] = ["main.nim", "src/main.nim"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Passing,
    Failing,
    #[serde(rename = "no source")]
    NoSource,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passing => "passing",
            Self::Failing => "failing",
            Self::NoSource => "no source",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Passing => "brightgreen",
            Self::NoSource => "lightgrey",
            Self::Failing => "red",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry file to type-check, relative to `root`.
///
/// Fixed candidates win; otherwise the first non-test `*.nim` file in the
/// tree.
pub fn find_entry_file(root: &Path) -> Option<PathBuf> {
    if let Some(candidate) = ENTRY_CANDIDATES
        .into_iter()
        .map(PathBuf::from)
        .find(|p| root.join(p).is_file())
    {
        return Some(candidate);
    }

    sources::nim_files(root)
        .into_iter()
        .find(|p| !p.to_string_lossy().contains("test"))
}

pub fn check_build(root: &Path, runner: &dyn CommandRunner) -> BuildStatus {
    info!("Checking build status...");

    let Some(entry) = find_entry_file(root) else {
        info!("No Nim source found");
        return BuildStatus::NoSource;
    };

    let command = ToolCommand::new("nim")
        .arg("check")
        .path_arg(&entry)
        .current_dir(root);

    match runner.run(&command) {
        Ok(output) if output.success() => BuildStatus::Passing,
        Ok(output) => {
            warn!(entry = %entry.display(), stderr = %output.stderr.trim(), "Build failed");
            BuildStatus::Failing
        }
        Err(err) => {
            warn!(error = %err, "Build check could not run");
            BuildStatus::Failing
        }
    }
}
