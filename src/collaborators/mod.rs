//! Contracts of the external collaborators the orchestrator drives.
//!
//! Each trait is a seam: production implementations live in [`crate::adapters`], tests
//! plug in-memory fakes. Failures are opaque `anyhow` errors; the orchestrator decides
//! what they mean for a release.

use crate::manifest::ImageEntry;
use crate::release::{Architecture, Release};
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Lists upstream releases with their end-of-life dates.
#[async_trait]
pub trait ReleaseScraper: Send + Sync {
    async fn scrape(&self) -> Result<Vec<Release>>;
}

/// Fetches the rootfs archives a release still lacks.
///
/// Must be idempotent: archives already present are left alone. Any unreachable
/// archive fails the whole call. `sources` carries the archive URLs the scraper found
/// for this release; an architecture without one falls back to the mirror layout.
#[async_trait]
pub trait RootFsDownloader: Send + Sync {
    async fn download_missing(
        &self,
        entry: &ImageEntry,
        architectures: &BTreeSet<Architecture>,
        sources: &BTreeMap<Architecture, String>,
    ) -> Result<()>;
}

/// A locally built, architecture-specific image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltImage {
    pub version: String,
    pub architecture: Architecture,
    /// Local reference, e.g. `alpine:3.19.1-x86_64`.
    pub reference: String,
}

impl BuiltImage {
    pub fn new(image_name: &str, version: &str, architecture: Architecture) -> Self {
        Self {
            version: version.to_string(),
            architecture,
            reference: format!("{}:{}", image_name, arch_tag(version, architecture)),
        }
    }

    /// Tag of this image within a repository (`3.19.1-x86_64`).
    pub fn tag(&self) -> String {
        arch_tag(&self.version, self.architecture)
    }
}

pub fn arch_tag(version: &str, architecture: Architecture) -> String {
    format!("{}-{}", version, architecture)
}

/// Builds one image per tracked architecture, as a single unit.
///
/// Either every architecture is returned or the call fails; partial results are
/// never reported.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build(
        &self,
        entry: &ImageEntry,
        image_name: &str,
    ) -> Result<BTreeMap<Architecture, BuiltImage>>;
}

/// Probes one built image for basic health.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn check(&self, image_name: &str, version: &str, architecture: Architecture)
        -> Result<()>;
}

/// Publishes a multi-architecture reference over the per-architecture images.
#[async_trait]
pub trait ManifestComposer: Send + Sync {
    async fn compose(
        &self,
        entry: &ImageEntry,
        image_name: &str,
        architectures: &[Architecture],
        is_latest: bool,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GitSyncAction {
    NoChanges,
    CommittedAndPushed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitSyncResult {
    pub action: GitSyncAction,
    pub commit_hash: Option<String>,
    pub error_message: Option<String>,
}

impl GitSyncResult {
    pub fn no_changes() -> Self {
        Self {
            action: GitSyncAction::NoChanges,
            commit_hash: None,
            error_message: None,
        }
    }

    pub fn pushed(commit_hash: impl Into<String>) -> Self {
        Self {
            action: GitSyncAction::CommittedAndPushed,
            commit_hash: Some(commit_hash.into()),
            error_message: None,
        }
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            action: GitSyncAction::Failed,
            commit_hash: None,
            error_message: Some(error_message.into()),
        }
    }
}

/// Commits and pushes the mirrored manifest. Never fails the run; errors are reported
/// in the result.
#[async_trait]
pub trait GitSync: Send + Sync {
    async fn commit_and_push_manifest(&self) -> GitSyncResult;
}
