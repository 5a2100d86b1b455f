//! shields.io badge URLs.

use serde::{Deserialize, Serialize};

pub const BADGE_SERVICE: &str = "https://img.shields.io/badge";

/// Escapes `%` first so the `%` introduced for spaces is not escaped again.
/// Nothing else is escaped.
fn escape(text: &str) -> String {
    text.replace('%', "%25").replace(' ', "%20")
}

pub fn badge_url(label: &str, message: &str, color: &str) -> String {
    format!(
        "{}/{}-{}-{}.svg",
        BADGE_SERVICE,
        escape(label),
        escape(message),
        color
    )
}

/// The four generated badges, in the order they are written out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeSet {
    pub version: String,
    pub build: String,
    pub tests: String,
    pub coverage: String,
}

impl BadgeSet {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("version", self.version.as_str()),
            ("build", self.build.as_str()),
            ("tests", self.tests.as_str()),
            ("coverage", self.coverage.as_str()),
        ]
        .into_iter()
    }
}
