//! Folding freshly scraped releases into the manifest.

use super::types::{ImageEntry, Manifest};
use crate::release::Release;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Result of a merge: the updated manifest and the versions it gained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub manifest: Manifest,
    pub added: Vec<String>,
}

/// Insert a `New` entry for every active release the manifest does not know yet.
///
/// Existing entries are never touched and releases missing from `active` are kept,
/// so history survives end-of-life. Merging the same set twice is a no-op.
pub fn merge_active_into_manifest(
    mut manifest: Manifest,
    active: &[Release],
    now: DateTime<Utc>,
) -> MergeOutcome {
    let mut added = Vec::new();

    for release in active {
        if manifest.insert_if_absent(ImageEntry::new(&release.version, now)) {
            debug!("Added {} to manifest", release.version);
            added.push(release.version.clone());
        }
    }

    MergeOutcome { manifest, added }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::types::ImageStatus;
    use crate::release::Architecture;
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn later() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap()
    }

    fn releases(versions: &[&str]) -> Vec<Release> {
        let eol = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        versions.iter().map(|v| Release::new(*v, eol)).collect()
    }

    fn historical() -> Manifest {
        let mut pushed = ImageEntry::new("3.16.9", now()).with_status(ImageStatus::Pushed);
        pushed.pushed_at_utc = Some(now());
        let mut failed = ImageEntry::new("3.19.1", now()).with_status(ImageStatus::Failed);
        failed.last_error = Some("registry down".into());
        Manifest::from_entries([Architecture::X86_64], [pushed, failed])
    }

    #[test]
    fn test_inserts_new_entries() {
        let outcome = merge_active_into_manifest(
            Manifest::new([Architecture::X86_64]),
            &releases(&["3.20.0", "3.21.2"]),
            now(),
        );

        assert_eq!(outcome.added, vec!["3.20.0", "3.21.2"]);
        let entry = outcome.manifest.get("3.21.2").unwrap();
        assert_eq!(entry.status, ImageStatus::New);
        assert_eq!(entry.created_at_utc, now());
        assert!(entry.architectures.is_empty());
    }

    #[test]
    fn test_is_idempotent() {
        let active = releases(&["3.19.1", "3.20.0"]);
        let once = merge_active_into_manifest(historical(), &active, now());
        let twice = merge_active_into_manifest(once.manifest.clone(), &active, later());

        assert_eq!(twice.manifest, once.manifest);
        assert!(twice.added.is_empty());
    }

    #[test]
    fn test_never_deletes_or_overwrites() {
        let before = historical();
        let outcome = merge_active_into_manifest(before.clone(), &releases(&["3.19.1"]), later());

        for entry in before.entries() {
            assert_eq!(outcome.manifest.get(&entry.version), Some(entry));
        }
        assert_eq!(outcome.manifest.len(), before.len());
    }

    #[test]
    fn test_duplicate_versions_in_active_set_insert_once() {
        let outcome = merge_active_into_manifest(
            Manifest::new([Architecture::X86_64]),
            &releases(&["3.20.0", "3.20.0"]),
            now(),
        );
        assert_eq!(outcome.added, vec!["3.20.0"]);
        assert_eq!(outcome.manifest.len(), 1);
    }
}
