//! Manifest data model
//!
//! The manifest is the single durable record of every release this tool has ever seen.
//! Entries are keyed by version and are never removed. Status changes are expressed as
//! [`Transition`] values so every mutation goes through one checked path.

use super::errors::ManifestError;
use crate::release::Architecture;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Build/publish progress of one release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    #[default]
    New,
    Downloaded,
    Built,
    Pushed,
    Failed,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::New => "new",
            ImageStatus::Downloaded => "downloaded",
            ImageStatus::Built => "built",
            ImageStatus::Pushed => "pushed",
            ImageStatus::Failed => "failed",
        }
    }

    /// Whether the planner may still select an entry in this state.
    pub fn is_pending(&self) -> bool {
        !matches!(self, ImageStatus::Pushed)
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status change recorded against one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Downloaded,
    Built {
        architectures: BTreeSet<Architecture>,
        at: DateTime<Utc>,
    },
    Pushed {
        at: DateTime<Utc>,
    },
    Failed {
        error: String,
    },
}

impl Transition {
    pub fn target(&self) -> ImageStatus {
        match self {
            Transition::Downloaded => ImageStatus::Downloaded,
            Transition::Built { .. } => ImageStatus::Built,
            Transition::Pushed { .. } => ImageStatus::Pushed,
            Transition::Failed { .. } => ImageStatus::Failed,
        }
    }
}

/// One release's build record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageEntry {
    pub version: String,
    #[serde(default)]
    pub status: ImageStatus,
    #[serde(default)]
    pub architectures: BTreeSet<Architecture>,
    pub created_at_utc: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_at_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pushed_at_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ImageEntry {
    pub fn new(version: impl Into<String>, created_at_utc: DateTime<Utc>) -> Self {
        Self {
            version: version.into(),
            status: ImageStatus::New,
            architectures: BTreeSet::new(),
            created_at_utc,
            built_at_utc: None,
            pushed_at_utc: None,
            last_error: None,
        }
    }

    pub fn with_status(mut self, status: ImageStatus) -> Self {
        self.status = status;
        self
    }

    /// Apply a transition, enforcing `New -> Downloaded -> Built -> Pushed`.
    ///
    /// Downloading restarts the pipeline and is allowed from every non-terminal state.
    /// `Failed` is reachable from every non-terminal state. `Pushed` accepts nothing.
    pub fn apply(&mut self, transition: Transition) -> Result<(), ManifestError> {
        let from = self.status;
        let to = transition.target();

        let allowed = match to {
            ImageStatus::Downloaded | ImageStatus::Failed => from.is_pending(),
            ImageStatus::Built => from == ImageStatus::Downloaded,
            ImageStatus::Pushed => from == ImageStatus::Built,
            ImageStatus::New => false,
        };

        if !allowed {
            return Err(ManifestError::InvalidTransition {
                version: self.version.clone(),
                from,
                to,
            });
        }

        match transition {
            Transition::Downloaded => {
                self.last_error = None;
            }
            Transition::Built { architectures, at } => {
                self.architectures = architectures;
                self.built_at_utc = Some(at);
                self.last_error = None;
            }
            Transition::Pushed { at } => {
                self.pushed_at_utc = Some(at);
                self.last_error = None;
            }
            Transition::Failed { error } => {
                self.last_error = Some(error);
            }
        }

        self.status = to;
        Ok(())
    }
}

/// Persisted record of every known release, keyed by version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    architectures: BTreeSet<Architecture>,
    #[serde(default)]
    images: BTreeMap<String, ImageEntry>,
}

impl Manifest {
    /// Empty manifest scoped to the tracked architectures.
    pub fn new(architectures: impl IntoIterator<Item = Architecture>) -> Self {
        Self {
            architectures: architectures.into_iter().collect(),
            images: BTreeMap::new(),
        }
    }

    pub fn from_entries(
        architectures: impl IntoIterator<Item = Architecture>,
        entries: impl IntoIterator<Item = ImageEntry>,
    ) -> Self {
        let mut manifest = Self::new(architectures);
        for entry in entries {
            manifest.images.insert(entry.version.clone(), entry);
        }
        manifest
    }

    pub fn architectures(&self) -> &BTreeSet<Architecture> {
        &self.architectures
    }

    pub(crate) fn set_architectures(&mut self, architectures: BTreeSet<Architecture>) {
        self.architectures = architectures;
    }

    pub fn get(&self, version: &str) -> Option<&ImageEntry> {
        self.images.get(version)
    }

    pub fn contains(&self, version: &str) -> bool {
        self.images.contains_key(version)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ImageEntry> {
        self.images.values()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Insert an entry unless the version is already known. Returns whether it was added.
    pub(crate) fn insert_if_absent(&mut self, entry: ImageEntry) -> bool {
        if self.images.contains_key(&entry.version) {
            return false;
        }
        self.images.insert(entry.version.clone(), entry);
        true
    }

    pub(crate) fn apply(
        &mut self,
        version: &str,
        transition: Transition,
    ) -> Result<&ImageEntry, ManifestError> {
        let entry = self
            .images
            .get_mut(version)
            .ok_or_else(|| ManifestError::UnknownVersion(version.to_string()))?;
        entry.apply(transition)?;
        Ok(entry)
    }

    /// Keys must match the version stored in each entry.
    pub(crate) fn find_key_mismatch(&self) -> Option<(&str, &str)> {
        self.images
            .iter()
            .find(|(key, entry)| key.as_str() != entry.version)
            .map(|(key, entry)| (key.as_str(), entry.version.as_str()))
    }
}
