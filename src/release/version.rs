//! Numeric release version ordering.
//!
//! Alpine versions are dotted numbers (`3.19`, `3.19.1`). Comparing them as strings
//! puts `3.9` after `3.19`, so every ordering decision goes through [`ReleaseVersion`].

use super::Release;
use std::cmp::Ordering;
use std::fmt;

/// A version string with numeric, component-wise ordering.
///
/// Missing components compare as zero, so `3.19` and `3.19.0` are equal in rank;
/// ties are broken by the raw string to keep the order total and deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseVersion {
    raw: String,
    parts: Vec<u64>,
}

impl ReleaseVersion {
    pub fn parse(raw: &str) -> Self {
        let parts = raw
            .trim_start_matches('v')
            .split('.')
            .map(|component| {
                let digits: String = component.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse::<u64>().unwrap_or(0)
            })
            .collect();

        Self {
            raw: raw.to_string(),
            parts,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn major(&self) -> u64 {
        self.parts.first().copied().unwrap_or(0)
    }

    pub fn minor(&self) -> u64 {
        self.parts.get(1).copied().unwrap_or(0)
    }

    /// Release branch (`3.19` for `3.19.4`), as used by mirror paths.
    pub fn branch(&self) -> String {
        format!("{}.{}", self.major(), self.minor())
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        for i in 0..self.parts.len().max(other.parts.len()) {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);

            match a.cmp(&b) {
                Ordering::Equal => continue,
                other => return other,
            }
        }

        self.raw.cmp(&other.raw)
    }
}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Compare two version strings numerically.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    ReleaseVersion::parse(a).cmp(&ReleaseVersion::parse(b))
}

/// Pick the highest version among the active releases.
///
/// Returns `None` for an empty set; callers then skip the `latest` alias.
pub fn determine_latest(releases: &[Release]) -> Option<String> {
    releases
        .iter()
        .map(|release| ReleaseVersion::parse(&release.version))
        .max()
        .map(|version| version.raw)
}
