//! Rootfs archive cache
//!
//! Archives live at `<cache_root>/<version>/alpine-minirootfs-<version>-<arch>.tar.gz`.
//! A file is only ever visible under its final name once its checksum matched.

use crate::collaborators::RootFsDownloader;
use crate::manifest::ImageEntry;
use crate::release::{rootfs_file_name, rootfs_url, Architecture};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory holding every archive of one release.
pub fn release_cache_dir(cache_root: &Path, version: &str) -> PathBuf {
    cache_root.join(version)
}

pub fn rootfs_path(cache_root: &Path, version: &str, arch: Architecture) -> PathBuf {
    release_cache_dir(cache_root, version).join(rootfs_file_name(version, arch))
}

pub struct HttpRootFsDownloader {
    client: Client,
    mirror: String,
    cache_root: PathBuf,
}

impl HttpRootFsDownloader {
    pub fn new(client: Client, mirror: impl Into<String>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            mirror: mirror.into(),
            cache_root: cache_root.into(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?
            .error_for_status()
            .with_context(|| format!("Download of {} failed", url))
    }

    async fn download_one(
        &self,
        version: &str,
        arch: Architecture,
        url: &str,
        target: &Path,
    ) -> Result<()> {
        info!(version, arch = %arch, "Downloading {}", url);

        let checksum_url = format!("{}.sha256", url);
        let expected = parse_checksum(&self.fetch(&checksum_url).await?.text().await?)
            .with_context(|| format!("Unreadable checksum at {}", checksum_url))?;

        let bytes = self
            .fetch(url)
            .await?
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;

        let actual = hex::encode(Sha256::digest(&bytes));
        if actual != expected {
            bail!(
                "Checksum mismatch for {}: expected {}, got {}",
                rootfs_file_name(version, arch),
                expected,
                actual
            );
        }

        write_atomic(target, &bytes).await?;
        debug!("Stored {} ({} bytes)", target.display(), bytes.len());
        Ok(())
    }
}

#[async_trait]
impl RootFsDownloader for HttpRootFsDownloader {
    async fn download_missing(
        &self,
        entry: &ImageEntry,
        architectures: &BTreeSet<Architecture>,
        sources: &BTreeMap<Architecture, String>,
    ) -> Result<()> {
        let dir = release_cache_dir(&self.cache_root, &entry.version);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        for arch in architectures {
            let target = rootfs_path(&self.cache_root, &entry.version, *arch);
            if tokio::fs::try_exists(&target).await.unwrap_or(false) {
                debug!(version = %entry.version, arch = %arch, "Rootfs already cached");
                continue;
            }
            let url = sources
                .get(arch)
                .cloned()
                .unwrap_or_else(|| rootfs_url(&self.mirror, &entry.version, *arch));
            self.download_one(&entry.version, *arch, &url, &target).await?;
        }

        Ok(())
    }
}

/// First token of a `sha256sum`-style line, lowercased.
fn parse_checksum(body: &str) -> Result<String> {
    let digest = body
        .split_whitespace()
        .next()
        .map(str::to_lowercase)
        .unwrap_or_default();

    if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("expected a sha256 hex digest, got '{}'", body.trim());
    }
    Ok(digest)
}

async fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .context("Rootfs target has no file name")?;
    let temp = target.with_file_name(format!(".{}.part", file_name));

    tokio::fs::write(&temp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", temp.display()))?;
    tokio::fs::rename(&temp, target)
        .await
        .with_context(|| format!("Failed to move {} into place", temp.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_parse_checksum() {
        let digest = "A".repeat(64);
        let body = format!("{}  alpine-minirootfs-3.20.3-x86_64.tar.gz\n", digest);
        assert_eq!(parse_checksum(&body).unwrap(), "a".repeat(64));
        assert!(parse_checksum("not-a-digest").is_err());
        assert!(parse_checksum("").is_err());
    }

    #[test]
    fn test_rootfs_path_layout() {
        let path = rootfs_path(Path::new("/cache"), "3.20.3", Architecture::Aarch64);
        assert_eq!(
            path,
            PathBuf::from("/cache/3.20.3/alpine-minirootfs-3.20.3-aarch64.tar.gz")
        );
    }

    #[tokio::test]
    async fn test_cached_archives_are_not_fetched() {
        let dir = TempDir::new().unwrap();
        let target = rootfs_path(dir.path(), "3.20.3", Architecture::X86_64);
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::write(&target, b"cached").unwrap();

        // The mirror is unreachable, so any fetch would fail the call.
        let downloader =
            HttpRootFsDownloader::new(Client::new(), "http://127.0.0.1:9", dir.path());
        let entry = ImageEntry::new("3.20.3", Utc::now());
        let archs: BTreeSet<Architecture> = [Architecture::X86_64].into_iter().collect();

        downloader
            .download_missing(&entry, &archs, &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"cached");
    }

    #[tokio::test]
    async fn test_unreachable_archive_fails() {
        let dir = TempDir::new().unwrap();
        let downloader =
            HttpRootFsDownloader::new(Client::new(), "http://127.0.0.1:9", dir.path());
        let entry = ImageEntry::new("3.20.3", Utc::now());
        let archs: BTreeSet<Architecture> = [Architecture::Aarch64].into_iter().collect();

        assert!(downloader
            .download_missing(&entry, &archs, &BTreeMap::new())
            .await
            .is_err());
        assert!(!rootfs_path(dir.path(), "3.20.3", Architecture::Aarch64).exists());
    }

    #[tokio::test]
    async fn test_scraped_source_is_preferred_over_mirror() {
        let dir = TempDir::new().unwrap();
        // Only the scraped URL may be tried.
        let downloader =
            HttpRootFsDownloader::new(Client::new(), "http://mirror.invalid", dir.path());
        let entry = ImageEntry::new("3.20.3", Utc::now());
        let archs: BTreeSet<Architecture> = [Architecture::X86_64].into_iter().collect();
        let sources: BTreeMap<Architecture, String> = [(
            Architecture::X86_64,
            "http://127.0.0.1:9/scraped/rootfs.tar.gz".to_string(),
        )]
        .into_iter()
        .collect();

        let error = downloader
            .download_missing(&entry, &archs, &sources)
            .await
            .unwrap_err();
        assert!(format!("{:#}", error).contains("http://127.0.0.1:9/scraped/rootfs.tar.gz"));
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a.tar.gz");
        write_atomic(&target, b"data").await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"data");
        assert!(!dir.path().join(".a.tar.gz.part").exists());
    }
}
