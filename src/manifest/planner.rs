//! Work selection and reporting over the manifest.

use super::types::{ImageEntry, ImageStatus, Manifest};
use crate::release::{compare_versions, Release};
use serde::Serialize;
use std::collections::HashSet;

/// Entries that still need work, newest version first.
///
/// Only versions present in `active` are considered; `Pushed` entries never appear.
/// The order depends only on version numbers, so a fixed limit makes the same
/// progress on every run.
pub fn images_to_process(manifest: &Manifest, active: &[Release]) -> Vec<ImageEntry> {
    let active_versions: HashSet<&str> = active.iter().map(|r| r.version.as_str()).collect();

    let mut pending: Vec<ImageEntry> = manifest
        .entries()
        .filter(|entry| entry.status.is_pending())
        .filter(|entry| active_versions.contains(entry.version.as_str()))
        .cloned()
        .collect();

    pending.sort_by(|a, b| compare_versions(&b.version, &a.version));
    pending
}

/// Tally of entries per status, historical ones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ManifestStats {
    pub total: usize,
    pub pushed: usize,
    pub built: usize,
    pub downloaded: usize,
    pub new: usize,
    pub failed: usize,
}

pub fn stats(manifest: &Manifest) -> ManifestStats {
    manifest
        .entries()
        .fold(ManifestStats::default(), |mut stats, entry| {
            stats.total += 1;
            match entry.status {
                ImageStatus::Pushed => stats.pushed += 1,
                ImageStatus::Built => stats.built += 1,
                ImageStatus::Downloaded => stats.downloaded += 1,
                ImageStatus::New => stats.new += 1,
                ImageStatus::Failed => stats.failed += 1,
            }
            stats
        })
}
