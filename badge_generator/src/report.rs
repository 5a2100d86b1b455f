//! Badge persistence: `badges/data.json` and README badge links.

use std::fs;
use std::path::Path;

use chrono::{Local, SecondsFormat};
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::badge::BadgeSet;
use crate::error::{BadgeError, BadgeResult};
use crate::runner::{CommandRunner, ToolCommand};

/// On-disk record, overwritten on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeData {
    pub generated_at: String,
    pub badges: BadgeSet,
}

/// README alt text and the badge each one links to.
struct ReadmeBadge {
    alt: &'static str,
    pattern: Regex,
    select: fn(&BadgeSet) -> &str,
}

fn readme_badge(alt: &'static str, select: fn(&BadgeSet) -> &str) -> ReadmeBadge {
    let pattern = format!(r"\[!\[{}\].*?\]\([^)]*\)", regex::escape(alt));
    ReadmeBadge {
        alt,
        pattern: Regex::new(&pattern).expect("valid readme badge regex"),
        select,
    }
}

static README_BADGES: Lazy<Vec<ReadmeBadge>> = Lazy::new(|| {
    vec![
        readme_badge("Build Status", |b| b.build.as_str()),
        readme_badge("Test Coverage", |b| b.coverage.as_str()),
        readme_badge("Tests", |b| b.tests.as_str()),
        readme_badge("Version", |b| b.version.as_str()),
    ]
});

/// ISO-8601 timestamp with seconds precision, from `date -Iseconds`.
pub fn timestamp(runner: &dyn CommandRunner) -> String {
    match runner.run(&ToolCommand::new("date").arg("-Iseconds")) {
        Ok(output) if output.success() && !output.stdout.trim().is_empty() => {
            output.stdout.trim().to_string()
        }
        _ => {
            debug!("date -Iseconds unavailable, formatting timestamp locally");
            Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
        }
    }
}

pub fn save_badge_data(path: &Path, data: &BadgeData) -> BadgeResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| BadgeError::io(parent, e))?;
        }
    }

    let json = serde_json::to_string_pretty(data)?;
    fs::write(path, json).map_err(|e| BadgeError::io(path, e))?;

    info!(path = %path.display(), "Badge data saved");
    Ok(())
}

/// Replaces the first link of each badge category; everything else is kept.
pub fn rewrite_readme(content: &str, badges: &BadgeSet) -> String {
    let mut content = content.to_string();
    for badge in README_BADGES.iter() {
        let link = format!("[![{}]({})](#)", badge.alt, (badge.select)(badges));
        content = badge
            .pattern
            .replace(&content, NoExpand(&link))
            .into_owned();
    }
    content
}

/// Returns `false` when the README does not exist.
pub fn update_readme(path: &Path, badges: &BadgeSet) -> BadgeResult<bool> {
    if !path.is_file() {
        error!(path = %path.display(), "README not found");
        return Ok(false);
    }

    let content = fs::read_to_string(path).map_err(|e| BadgeError::io(path, e))?;
    let updated = rewrite_readme(&content, badges);
    fs::write(path, updated).map_err(|e| BadgeError::io(path, e))?;

    info!(path = %path.display(), "README updated with new badges");
    Ok(true)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::badge::badge_url;
    use crate::runner::scripted::ScriptedRunner;
    use tempfile::tempdir;

    fn badges() -> BadgeSet {
        BadgeSet {
            version: badge_url("version", "v2.3.1", "blue"),
            build: badge_url("build", "passing", "brightgreen"),
            tests: badge_url("tests", "10 tests", "brightgreen"),
            coverage: badge_url("coverage", "68.0%", "red"),
        }
    }

    #[test]
    fn rewrite_readme__tests_link__then_url_replaced() {
        let readme = "# NimLisp\n\n[![Tests](old-url)](#)\n\nSome text.\n";
        let updated = rewrite_readme(readme, &badges());
        assert_eq!(
            updated,
            "# NimLisp\n\n[![Tests](https://img.shields.io/badge/tests-10%20tests-brightgreen.svg)](#)\n\nSome text.\n"
        );
    }

    #[test]
    fn rewrite_readme__all_categories__then_each_replaced() {
        let readme = "[![Build Status](https://x/build.svg)](https://ci)\n\
[![Tests](https://x/tests.svg)](#)\n\
[![Test Coverage](https://x/cov.svg)](#)\n\
[![Version](https://x/v.svg)](#)\n";
        let set = badges();
        let updated = rewrite_readme(readme, &set);

        assert!(updated.contains(&format!("[![Build Status]({})](#)", set.build)));
        assert!(updated.contains(&format!("[![Tests]({})](#)", set.tests)));
        assert!(updated.contains(&format!("[![Test Coverage]({})](#)", set.coverage)));
        assert!(updated.contains(&format!("[![Version]({})](#)", set.version)));
        assert!(!updated.contains("https://x/"));
    }

    #[test]
    fn rewrite_readme__duplicate_links__then_only_first_replaced() {
        let readme = "[![Version](a)](#) [![Version](b)](#)";
        let updated = rewrite_readme(readme, &badges());
        assert!(updated.ends_with("[![Version](b)](#)"));
        assert!(!updated.contains("(a)"));
    }

    #[test]
    fn rewrite_readme__no_badges__then_unchanged() {
        let readme = "# Title\n\n![Tests](plain-image.png)\n";
        assert_eq!(rewrite_readme(readme, &badges()), readme);
    }

    #[test]
    fn rewrite_readme__dollar_in_url__then_inserted_literally() {
        let mut set = badges();
        set.tests = "https://example.com/$1".to_string();
        let updated = rewrite_readme("[![Tests](x)](#)", &set);
        assert_eq!(updated, "[![Tests](https://example.com/$1)](#)");
    }

    #[test]
    fn update_readme__missing_file__then_false() {
        let dir = tempdir().unwrap();
        let updated = update_readme(&dir.path().join("README.md"), &badges()).unwrap();
        assert!(!updated);
        assert!(!dir.path().join("README.md").exists());
    }

    #[test]
    fn save_badge_data__nested_path__then_directory_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("badges/data.json");
        let data = BadgeData {
            generated_at: "2024-05-01T10:00:00+00:00".to_string(),
            badges: badges(),
        };

        save_badge_data(&path, &data).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("{\n  \"generated_at\": \"2024-05-01T10:00:00+00:00\",\n  \"badges\": {\n    \"version\""));
        let parsed: BadgeData = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn save_badge_data__existing_file__then_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{\"stale\": true}").unwrap();
        let data = BadgeData {
            generated_at: "now".to_string(),
            badges: badges(),
        };

        save_badge_data(&path, &data).unwrap();

        let parsed: BadgeData = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn timestamp__date_available__then_trimmed_output() {
        let runner = ScriptedRunner::new().on("date -Iseconds", 0, "2024-05-01T10:00:00+02:00\n", "");
        assert_eq!(timestamp(&runner), "2024-05-01T10:00:00+02:00");
    }

    #[test]
    fn timestamp__date_missing__then_local_iso8601() {
        let stamp = timestamp(&ScriptedRunner::new());
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
        assert!(!stamp.contains('.'));
    }
}
