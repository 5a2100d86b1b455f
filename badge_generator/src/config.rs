//! Generator configuration.
//!
//! Every path is either absolute or relative to the project root; the
//! defaults reproduce the conventional Nim project layout.

use std::path::{Path, PathBuf};

use clap::Args;

use crate::version;

pub const DEFAULT_README: &str = "README.md";
pub const DEFAULT_DATA_FILE: &str = "badges/data.json";
pub const DEFAULT_TESTS_DIR: &str = "tests";
pub const DEFAULT_HTML_DIR: &str = "coverage_html";

/// Options of the `generate` subcommand.
#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// README file whose badge links are rewritten
    #[arg(long, value_name = "PATH", default_value = DEFAULT_README)]
    pub readme: PathBuf,

    /// JSON file receiving the generated badge URLs
    #[arg(long, value_name = "PATH", default_value = DEFAULT_DATA_FILE)]
    pub data_file: PathBuf,

    /// Directory holding the `t_*.nim` test files
    #[arg(long, value_name = "PATH", default_value = DEFAULT_TESTS_DIR)]
    pub tests_dir: PathBuf,

    /// Nim compiler cache where coverage counters are written
    #[arg(long, value_name = "PATH", env = "BADGES_NIM_CACHE")]
    pub nim_cache: Option<PathBuf>,

    /// Output directory of the HTML coverage report
    #[arg(long, value_name = "PATH", default_value = DEFAULT_HTML_DIR)]
    pub html_dir: PathBuf,

    /// Project name used in the coverage report title
    #[arg(long)]
    pub project_name: Option<String>,

    /// Skip generating the HTML coverage report
    #[arg(long)]
    pub no_coverage_report: bool,
}

#[derive(Debug, Clone)]
pub struct BadgeConfig {
    pub root: PathBuf,
    pub readme: PathBuf,
    pub data_file: PathBuf,
    pub tests_dir: PathBuf,
    pub nim_cache: PathBuf,
    pub html_dir: PathBuf,
    pub project_name: Option<String>,
    pub coverage_report: bool,
}

impl BadgeConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            readme: PathBuf::from(DEFAULT_README),
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            tests_dir: PathBuf::from(DEFAULT_TESTS_DIR),
            nim_cache: default_nim_cache(),
            html_dir: PathBuf::from(DEFAULT_HTML_DIR),
            project_name: None,
            coverage_report: true,
        }
    }

    pub fn from_args(root: impl Into<PathBuf>, args: GenerateArgs) -> Self {
        Self {
            root: root.into(),
            readme: args.readme,
            data_file: args.data_file,
            tests_dir: args.tests_dir,
            nim_cache: args.nim_cache.unwrap_or_else(default_nim_cache),
            html_dir: args.html_dir,
            project_name: args.project_name,
            coverage_report: !args.no_coverage_report,
        }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn readme_path(&self) -> PathBuf {
        self.resolve(&self.readme)
    }

    pub fn data_path(&self) -> PathBuf {
        self.resolve(&self.data_file)
    }

    pub fn tests_path(&self) -> PathBuf {
        self.resolve(&self.tests_dir)
    }

    pub fn html_path(&self) -> PathBuf {
        self.resolve(&self.html_dir)
    }

    pub fn nim_cache_path(&self) -> PathBuf {
        self.resolve(&self.nim_cache)
    }

    /// Explicit name, else the manifest stem, else the root directory name.
    pub fn project_name(&self) -> String {
        if let Some(name) = &self.project_name {
            return name.clone();
        }
        if let Some(stem) = version::find_manifest(&self.root)
            .as_deref()
            .and_then(Path::file_stem)
        {
            return stem.to_string_lossy().into_owned();
        }
        self.root
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "Project".to_string())
    }
}

/// `$HOME/.cache/nim`, where `nim c` keeps objects and `.gcda` counters.
pub fn default_nim_cache() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".cache")
        .join("nim")
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use tempfile::tempdir;

    #[test]
    fn badge_config__relative_paths__then_resolved_against_root() {
        let config = BadgeConfig::new("/work/project");
        assert_eq!(config.readme_path(), PathBuf::from("/work/project/README.md"));
        assert_eq!(
            config.data_path(),
            PathBuf::from("/work/project/badges/data.json")
        );
        assert_eq!(config.tests_path(), PathBuf::from("/work/project/tests"));
    }

    #[test]
    fn badge_config__relative_nim_cache__then_resolved_against_root() {
        let mut config = BadgeConfig::new("/work/project");
        config.nim_cache = PathBuf::from(".cache/nim");
        assert_eq!(
            config.nim_cache_path(),
            PathBuf::from("/work/project/.cache/nim")
        );

        config.nim_cache = PathBuf::from("/home/dev/.cache/nim");
        assert_eq!(config.nim_cache_path(), PathBuf::from("/home/dev/.cache/nim"));
    }

    #[test]
    fn badge_config__absolute_path__then_kept() {
        let mut config = BadgeConfig::new("/work/project");
        config.html_dir = PathBuf::from("/tmp/html");
        assert_eq!(config.html_path(), PathBuf::from("/tmp/html"));
    }

    #[test]
    fn badge_config__from_args__then_copies_options() {
        let args = GenerateArgs {
            readme: PathBuf::from("docs/README.md"),
            data_file: PathBuf::from("out/badges.json"),
            tests_dir: PathBuf::from("spec"),
            nim_cache: Some(PathBuf::from("/cache")),
            html_dir: PathBuf::from("cov"),
            project_name: Some("NimLisp".to_string()),
            no_coverage_report: true,
        };
        let config = BadgeConfig::from_args("/p", args);
        assert_eq!(config.readme_path(), PathBuf::from("/p/docs/README.md"));
        assert_eq!(config.nim_cache, PathBuf::from("/cache"));
        assert!(!config.coverage_report);
        assert_eq!(config.project_name(), "NimLisp");
    }

    #[test]
    fn badge_config__project_name__then_manifest_stem() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("nimlisp.nimble"), "version = \"1.0.0\"\n").unwrap();
        let config = BadgeConfig::new(dir.path());
        assert_eq!(config.project_name(), "nimlisp");
    }

    #[test]
    fn badge_config__project_name_without_manifest__then_directory_name() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("calculator");
        std::fs::create_dir(&root).unwrap();
        let config = BadgeConfig::new(&root);
        assert_eq!(config.project_name(), "calculator");
    }
}
