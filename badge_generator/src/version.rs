//! Project version lookup from the `.nimble` manifest.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

pub const DEFAULT_VERSION: &str = "0.1.0";
pub const MANIFEST_EXTENSION: &str = "nimble";

static VERSION_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"version\s*=\s*"([^"]+)""#).expect("valid version regex"));

/// First `*.nimble` file directly under `root`, in sorted order.
pub fn find_manifest(root: &Path) -> Option<PathBuf> {
    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        MANIFEST_EXTENSION
    );
    let mut manifests: Vec<PathBuf> = glob::glob(&pattern)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    manifests.sort();
    manifests.into_iter().next()
}

/// Value of the first `version = "..."` assignment in manifest text.
pub fn extract_version(manifest: &str) -> Option<&str> {
    VERSION_FIELD
        .captures(manifest)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Reads the project version, falling back to [`DEFAULT_VERSION`] on any
/// problem.
pub fn project_version(root: &Path) -> String {
    let Some(manifest) = find_manifest(root) else {
        debug!(root = %root.display(), "No manifest found, using default version");
        return DEFAULT_VERSION.to_string();
    };

    match fs::read_to_string(&manifest) {
        Ok(content) => match extract_version(&content) {
            Some(version) => version.to_string(),
            None => {
                debug!(manifest = %manifest.display(), "Manifest has no version field");
                DEFAULT_VERSION.to_string()
            }
        },
        Err(err) => {
            warn!(manifest = %manifest.display(), error = %err, "Failed to read manifest");
            DEFAULT_VERSION.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use tempfile::tempdir;

    #[test]
    fn extract_version__quoted_assignment__then_value() {
        let manifest = "# Package\n\nversion       = \"2.3.1\"\nauthor = \"me\"\n";
        assert_eq!(extract_version(manifest), Some("2.3.1"));
    }

    #[test]
    fn extract_version__no_field__then_none() {
        assert_eq!(extract_version("author = \"me\"\nlicense = \"MIT\""), None);
        assert_eq!(extract_version("version = 2"), None);
    }

    #[test]
    fn extract_version__several_fields__then_first() {
        let manifest = "version = \"1.0.0\"\nversion = \"9.9.9\"\n";
        assert_eq!(extract_version(manifest), Some("1.0.0"));
    }

    #[test]
    fn project_version__manifest_present__then_parsed() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("nimlisp.nimble"), "version = \"2.3.1\"\n").unwrap();
        assert_eq!(project_version(dir.path()), "2.3.1");
    }

    #[test]
    fn project_version__no_manifest__then_default() {
        let dir = tempdir().unwrap();
        assert_eq!(project_version(dir.path()), DEFAULT_VERSION);
    }

    #[test]
    fn project_version__manifest_without_version__then_default() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("pkg.nimble"), "author = \"x\"\n").unwrap();
        assert_eq!(project_version(dir.path()), DEFAULT_VERSION);
    }

    #[test]
    fn project_version__unreadable_manifest__then_default() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("pkg.nimble"), [0xff, 0xfe, 0x00]).unwrap();
        assert_eq!(project_version(dir.path()), DEFAULT_VERSION);
    }

    #[test]
    fn find_manifest__nested_manifest__then_ignored() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("vendor/dep.nimble"), "version = \"3.0.0\"").unwrap();
        assert!(find_manifest(dir.path()).is_none());
    }
}
