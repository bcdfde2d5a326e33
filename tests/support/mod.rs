//! In-memory collaborators for driving full runs without network, docker or git.

#![allow(dead_code)]

use alpine_autobuild::app::Services;
use alpine_autobuild::collaborators::{
    BuiltImage, GitSync, GitSyncResult, HealthChecker, ImageBuilder, ManifestComposer,
    ReleaseScraper, RootFsDownloader,
};
use alpine_autobuild::config::AutobuildConfig;
use alpine_autobuild::manifest::ImageEntry;
use alpine_autobuild::orchestrator::Collaborators;
use alpine_autobuild::progress::NoOpHandler;
use alpine_autobuild::registry::{PushAggregator, Registry, RegistryPusher};
use alpine_autobuild::release::{Architecture, Release};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Fixed "today" for every scenario.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
}

pub fn release(version: &str) -> Release {
    Release::new(version, NaiveDate::from_ymd_opt(2028, 5, 1).unwrap())
}

pub fn expired_release(version: &str) -> Release {
    Release::new(version, NaiveDate::from_ymd_opt(2025, 11, 1).unwrap())
}

/// Configuration rooted in `root`, pushing to Docker Hub and GHCR.
pub fn config(root: &Path, extra: &[(&str, &str)]) -> AutobuildConfig {
    let root = root.display().to_string();
    let mut vars: HashMap<String, String> = [
        ("REPO_ROOT", root.as_str()),
        ("DOCKER_USERNAME", "bot"),
        ("DOCKER_PASSWORD", "secret"),
        ("DOCKER_NAMESPACE", "acme"),
        ("GHCR_USERNAME", "octo"),
        ("GHCR_TOKEN", "ghp_token"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }

    let config = AutobuildConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();
    config.validate().unwrap();
    config
}

/// Ordered record of every collaborator call, e.g. `build:3.21.4`.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, call: String) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn contains(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }
}

/// Which calls should fail, keyed by version (or registry name for pushes).
#[derive(Clone, Default)]
pub struct Failures {
    pub download: HashSet<String>,
    pub build: HashSet<String>,
    pub health: HashSet<String>,
    pub compose: HashSet<String>,
    pub registries: HashSet<String>,
}

pub struct MockScraper {
    pub result: Mutex<Option<Result<Vec<Release>>>>,
}

#[async_trait]
impl ReleaseScraper for MockScraper {
    async fn scrape(&self) -> Result<Vec<Release>> {
        self.result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

struct MockDownloader {
    log: CallLog,
    fail: HashSet<String>,
}

#[async_trait]
impl RootFsDownloader for MockDownloader {
    async fn download_missing(
        &self,
        entry: &ImageEntry,
        _architectures: &BTreeSet<Architecture>,
        sources: &BTreeMap<Architecture, String>,
    ) -> Result<()> {
        self.log.record(format!("download:{}", entry.version));
        for (arch, url) in sources {
            self.log.record(format!("source:{}:{}", arch, url));
        }
        if self.fail.contains(&entry.version) {
            bail!("404 Not Found for {}", entry.version);
        }
        Ok(())
    }
}

struct MockBuilder {
    log: CallLog,
    fail: HashSet<String>,
    architectures: Vec<Architecture>,
}

#[async_trait]
impl ImageBuilder for MockBuilder {
    async fn build(
        &self,
        entry: &ImageEntry,
        image_name: &str,
    ) -> Result<BTreeMap<Architecture, BuiltImage>> {
        self.log.record(format!("build:{}", entry.version));
        if self.fail.contains(&entry.version) {
            bail!("docker buildx build exited with 1");
        }
        Ok(self
            .architectures
            .iter()
            .map(|a| (*a, BuiltImage::new(image_name, &entry.version, *a)))
            .collect())
    }
}

struct MockHealthChecker {
    log: CallLog,
    fail: HashSet<String>,
}

#[async_trait]
impl HealthChecker for MockHealthChecker {
    async fn check(
        &self,
        _image_name: &str,
        version: &str,
        architecture: Architecture,
    ) -> Result<()> {
        self.log.record(format!("health:{}:{}", version, architecture));
        if self.fail.contains(version) {
            bail!("container exited with status 1");
        }
        Ok(())
    }
}

struct MockComposer {
    log: CallLog,
    fail: HashSet<String>,
}

#[async_trait]
impl ManifestComposer for MockComposer {
    async fn compose(
        &self,
        entry: &ImageEntry,
        _image_name: &str,
        architectures: &[Architecture],
        is_latest: bool,
    ) -> Result<()> {
        let archs: Vec<&str> = architectures.iter().map(|a| a.as_str()).collect();
        self.log.record(format!(
            "compose:{}:{}:{}",
            entry.version,
            archs.join(","),
            if is_latest { "latest" } else { "-" }
        ));
        if self.fail.contains(&entry.version) {
            bail!("imagetools create failed");
        }
        Ok(())
    }
}

struct MockPusher {
    log: CallLog,
    reject: HashSet<String>,
}

#[async_trait]
impl RegistryPusher for MockPusher {
    async fn push(&self, image: &BuiltImage, registry: &Registry) -> Result<String> {
        self.log
            .record(format!("push:{}:{}", registry.host, image.tag()));
        if self.reject.contains(&registry.name) {
            bail!("denied: requested access to the resource is denied");
        }
        Ok(format!("pushed {}", image.tag()))
    }
}

pub struct MockGit {
    log: CallLog,
    result: GitSyncResult,
}

#[async_trait]
impl GitSync for MockGit {
    async fn commit_and_push_manifest(&self) -> GitSyncResult {
        self.log.record("git".to_string());
        self.result.clone()
    }
}

/// Builds [`Services`] from mocks that all write into one [`CallLog`].
pub struct MockWorld {
    pub log: CallLog,
    pub failures: Failures,
    pub built_architectures: Vec<Architecture>,
    pub git_result: GitSyncResult,
}

impl Default for MockWorld {
    fn default() -> Self {
        Self {
            log: CallLog::default(),
            failures: Failures::default(),
            built_architectures: vec![Architecture::X86_64, Architecture::Aarch64],
            git_result: GitSyncResult::pushed("0123abcd"),
        }
    }
}

impl MockWorld {
    pub fn services(&self, config: &AutobuildConfig, releases: Vec<Release>) -> Services {
        self.services_with_scrape(config, Ok(releases))
    }

    pub fn services_with_scrape(
        &self,
        config: &AutobuildConfig,
        scraped: Result<Vec<Release>>,
    ) -> Services {
        Services {
            scraper: Arc::new(MockScraper {
                result: Mutex::new(Some(scraped)),
            }),
            collaborators: self.collaborators(config),
            git: Arc::new(MockGit {
                log: self.log.clone(),
                result: self.git_result.clone(),
            }),
            progress: Arc::new(NoOpHandler),
        }
    }

    pub fn collaborators(&self, config: &AutobuildConfig) -> Collaborators {
        self.collaborators_with_downloader(
            config,
            Arc::new(MockDownloader {
                log: self.log.clone(),
                fail: self.failures.download.clone(),
            }),
        )
    }

    pub fn collaborators_with_downloader(
        &self,
        config: &AutobuildConfig,
        downloader: Arc<dyn RootFsDownloader>,
    ) -> Collaborators {
        Collaborators {
            downloader,
            builder: Arc::new(MockBuilder {
                log: self.log.clone(),
                fail: self.failures.build.clone(),
                architectures: self.built_architectures.clone(),
            }),
            health_checker: Arc::new(MockHealthChecker {
                log: self.log.clone(),
                fail: self.failures.health.clone(),
            }),
            composer: Arc::new(MockComposer {
                log: self.log.clone(),
                fail: self.failures.compose.clone(),
            }),
            pusher: PushAggregator::new(
                config.registries.clone(),
                Arc::new(MockPusher {
                    log: self.log.clone(),
                    reject: self.failures.registries.clone(),
                }),
            ),
        }
    }
}
