//! Upstream release listing over HTTP
//!
//! Reads the Alpine `releases.json` index and reports the newest point release of each
//! stable branch together with the branch's end-of-life date.

use crate::collaborators::ReleaseScraper;
use crate::release::{compare_versions, rootfs_url, Architecture, Release};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct ReleaseIndex {
    #[serde(default)]
    release_branches: Vec<ReleaseBranch>,
}

#[derive(Debug, Deserialize)]
struct ReleaseBranch {
    rel_branch: String,
    #[serde(default)]
    eol_date: Option<String>,
    #[serde(default)]
    arches: Vec<String>,
    #[serde(default)]
    releases: Vec<PointRelease>,
}

#[derive(Debug, Deserialize)]
struct PointRelease {
    version: String,
}

pub struct HttpReleaseScraper {
    client: Client,
    url: String,
    mirror: String,
}

impl HttpReleaseScraper {
    pub fn new(client: Client, url: impl Into<String>, mirror: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            mirror: mirror.into(),
        }
    }
}

#[async_trait]
impl ReleaseScraper for HttpReleaseScraper {
    async fn scrape(&self) -> Result<Vec<Release>> {
        debug!("Fetching release index from {}", self.url);

        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", self.url))?
            .error_for_status()
            .with_context(|| format!("Release index request to {} failed", self.url))?
            .text()
            .await
            .context("Failed to read release index body")?;

        let releases = parse_release_index(&body, &self.mirror)?;
        info!("Scraped {} releases", releases.len());
        Ok(releases)
    }
}

/// Newest point release of every `vX.Y` branch. `edge`, branches without point releases
/// and branches with an unreadable end-of-life date are skipped.
pub fn parse_release_index(body: &str, mirror: &str) -> Result<Vec<Release>> {
    let index: ReleaseIndex =
        serde_json::from_str(body).context("Release index is not valid JSON")?;

    let mut releases = Vec::new();
    for branch in index.release_branches {
        if !branch.rel_branch.starts_with('v') {
            debug!("Skipping branch {}", branch.rel_branch);
            continue;
        }

        let Some(eol) = branch
            .eol_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
        else {
            warn!(
                "Skipping branch {}: missing or unparsable end-of-life date",
                branch.rel_branch
            );
            continue;
        };

        let Some(newest) = branch
            .releases
            .iter()
            .map(|r| r.version.trim())
            .filter(|v| !v.is_empty())
            .max_by(|a, b| compare_versions(a, b))
        else {
            continue;
        };

        let mut release = Release::new(newest, eol);
        for arch in branch
            .arches
            .iter()
            .filter_map(|a| a.parse::<Architecture>().ok())
        {
            release = release.with_download(arch, rootfs_url(mirror, newest, arch));
        }
        releases.push(release);
    }

    releases.sort_by(|a, b| match compare_versions(&b.version, &a.version) {
        Ordering::Equal => a.version.cmp(&b.version),
        other => other,
    });
    Ok(releases)
}
