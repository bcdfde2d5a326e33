//! Manifest persistence
//!
//! [`ManifestStore`] is the only read/write path to the JSON document. Writes go to a
//! sibling temp file which is fsynced and renamed over the target, so a crash mid-write
//! leaves either the old or the new document, never a truncated one.
//!
//! [`ManifestSession`] owns the in-memory manifest for a run and only exposes mutations
//! that persist before returning.

use super::errors::ManifestError;
use super::merge::{merge_active_into_manifest, MergeOutcome};
use super::types::{ImageEntry, Manifest, Transition};
use crate::release::{Architecture, Release};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest, or an empty one scoped to `tracked` when the file is absent.
    ///
    /// A document that does not parse into the schema is [`ManifestError::CorruptManifest`];
    /// nothing is repaired.
    pub fn load(
        &self,
        tracked: impl IntoIterator<Item = Architecture>,
    ) -> Result<Manifest, ManifestError> {
        let tracked: BTreeSet<Architecture> = tracked.into_iter().collect();

        if !self.path.exists() {
            debug!("No manifest at {}, starting empty", self.path.display());
            return Ok(Manifest::new(tracked));
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| ManifestError::io(&self.path, e))?;

        let mut manifest: Manifest =
            serde_json::from_str(&content).map_err(|e| ManifestError::CorruptManifest {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        if let Some((key, version)) = manifest.find_key_mismatch() {
            return Err(ManifestError::CorruptManifest {
                path: self.path.clone(),
                reason: format!("entry key '{}' holds version '{}'", key, version),
            });
        }

        if manifest.architectures() != &tracked {
            warn!(
                "Manifest architectures {:?} differ from configured {:?}; using configured set",
                manifest.architectures(),
                tracked
            );
            manifest.set_architectures(tracked);
        }

        Ok(manifest)
    }

    /// Atomically write the manifest. Safe to call after every transition.
    pub fn save(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ManifestError::io(parent, e))?;
        }

        let content = serde_json::to_string_pretty(manifest)?;
        write_atomic(&self.path, content.as_bytes())
    }
}

/// Write `bytes` to `path` through a temp file + rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ManifestError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "manifest.json".to_string());
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    {
        let file = fs::File::create(&temp_path).map_err(|e| ManifestError::io(&temp_path, e))?;
        let mut writer = std::io::BufWriter::new(file);
        writer
            .write_all(bytes)
            .and_then(|_| writer.flush())
            .map_err(|e| ManifestError::io(&temp_path, e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| ManifestError::io(&temp_path, e))?;
    }

    fs::rename(&temp_path, path).map_err(|e| ManifestError::io(path, e))
}

/// Exclusive owner of the manifest for the duration of a run.
///
/// Every mutation persists through the store before returning, so a caller cannot
/// advance an entry without the new state being on disk.
#[derive(Debug)]
pub struct ManifestSession {
    store: ManifestStore,
    manifest: Manifest,
}

impl ManifestSession {
    pub fn open(
        store: ManifestStore,
        tracked: impl IntoIterator<Item = Architecture>,
    ) -> Result<Self, ManifestError> {
        let manifest = store.load(tracked)?;
        Ok(Self { store, manifest })
    }

    /// Wrap an already-loaded manifest. Nothing is written until the first mutation.
    pub fn with_manifest(store: ManifestStore, manifest: Manifest) -> Self {
        Self { store, manifest }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Fold active releases into the manifest and persist the result.
    pub fn merge(
        &mut self,
        active: &[Release],
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, ManifestError> {
        let MergeOutcome { manifest, added } =
            merge_active_into_manifest(self.manifest.clone(), active, now);
        self.store.save(&manifest)?;
        self.manifest = manifest;
        Ok(added)
    }

    /// Apply a transition to one entry and persist. The in-memory manifest only
    /// changes once the write succeeded.
    pub fn record(
        &mut self,
        version: &str,
        transition: Transition,
    ) -> Result<&ImageEntry, ManifestError> {
        let mut next = self.manifest.clone();
        next.apply(version, transition)?;
        self.store.save(&next)?;
        self.manifest = next;
        self.manifest
            .get(version)
            .ok_or_else(|| ManifestError::UnknownVersion(version.to_string()))
    }

    pub fn into_manifest(self) -> Manifest {
        self.manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::types::ImageStatus;
    use chrono::{NaiveDate, TimeZone};
    use tempfile::TempDir;

    const ARCHS: [Architecture; 2] = [Architecture::X86_64, Architecture::Aarch64];

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_load_missing_returns_empty_scoped_manifest() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("manifest.json"));

        let manifest = store.load(ARCHS).unwrap();
        assert!(manifest.is_empty());
        assert_eq!(manifest.architectures().len(), 2);
    }

    #[test]
    fn test_save_then_load_preserves_entries() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("nested").join("manifest.json"));
        let manifest = Manifest::from_entries(
            ARCHS,
            [ImageEntry::new("3.19.1", now()).with_status(ImageStatus::Failed)],
        );

        store.save(&manifest).unwrap();
        let loaded = store.load(ARCHS).unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("manifest.json"));
        store.save(&Manifest::new(ARCHS)).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["manifest.json".to_string()]);
    }

    #[test]
    fn test_corrupt_manifest_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(&path, "{ \"images\": [1, 2").unwrap();

        let err = ManifestStore::new(&path).load(ARCHS).unwrap_err();
        assert!(matches!(err, ManifestError::CorruptManifest { .. }));
    }

    #[test]
    fn test_unknown_status_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(
            &path,
            r#"{"images":{"3.19":{"version":"3.19","status":"exploded","createdAtUtc":"2026-01-01T00:00:00Z"}}}"#,
        )
        .unwrap();

        let err = ManifestStore::new(&path).load(ARCHS).unwrap_err();
        assert!(matches!(err, ManifestError::CorruptManifest { .. }));
    }

    #[test]
    fn test_mismatched_key_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(
            &path,
            r#"{"images":{"3.18":{"version":"3.19","status":"new","createdAtUtc":"2026-01-01T00:00:00Z"}}}"#,
        )
        .unwrap();

        let err = ManifestStore::new(&path).load(ARCHS).unwrap_err();
        assert!(err.to_string().contains("3.18"));
    }

    #[test]
    fn test_session_record_persists_each_transition() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("manifest.json"));
        let mut session = ManifestSession::open(store.clone(), ARCHS).unwrap();

        let eol = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        session
            .merge(&[Release::new("3.19.1", eol)], now())
            .unwrap();
        assert_eq!(
            store.load(ARCHS).unwrap().get("3.19.1").unwrap().status,
            ImageStatus::New
        );

        session.record("3.19.1", Transition::Downloaded).unwrap();
        assert_eq!(
            store.load(ARCHS).unwrap().get("3.19.1").unwrap().status,
            ImageStatus::Downloaded
        );
    }

    #[test]
    fn test_session_rejected_transition_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("manifest.json"));
        let manifest = Manifest::from_entries(ARCHS, [ImageEntry::new("3.19.1", now())]);
        let mut session = ManifestSession::with_manifest(store.clone(), manifest);

        assert!(session
            .record("3.19.1", Transition::Pushed { at: now() })
            .is_err());
        assert_eq!(
            session.manifest().get("3.19.1").unwrap().status,
            ImageStatus::New
        );
        assert!(!store.path().exists());
    }

    #[test]
    fn test_session_failed_write_keeps_memory_state() {
        let dir = TempDir::new().unwrap();
        // A directory at the manifest path makes the final rename fail.
        let path = dir.path().join("manifest.json");
        fs::create_dir_all(path.join("occupied")).unwrap();

        let manifest = Manifest::from_entries(ARCHS, [ImageEntry::new("3.19.1", now())]);
        let mut session = ManifestSession::with_manifest(ManifestStore::new(&path), manifest);

        let err = session.record("3.19.1", Transition::Downloaded).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
        assert_eq!(
            session.manifest().get("3.19.1").unwrap().status,
            ImageStatus::New
        );
    }
}
