//! Top-level run lifecycle
//!
//! `seed → load → scrape → filter active → merge + save → plan → orchestrate → mirror
//! → git sync → summary`. Everything before the orchestrator is setup: a failure there aborts the
//! run with nothing processed.

use crate::adapters::{
    BollardHealthChecker, BollardRegistryPusher, DockerCliBuilder, DockerManifestComposer,
    GitCliSync, HttpReleaseScraper, HttpRootFsDownloader,
};
use crate::collaborators::{GitSync, GitSyncAction, ReleaseScraper};
use crate::config::{AutobuildConfig, ConfigError};
use crate::manifest::{
    images_to_process, merge_active_into_manifest, stats, store::write_atomic, ImageEntry,
    ManifestError, ManifestSession, ManifestStats, ManifestStore,
};
use crate::orchestrator::{
    BuildOrchestrator, Collaborators, OrchestratorError, OrchestratorOptions, RunSummary,
};
use crate::progress::{LoggingHandler, ProgressHandler};
use crate::registry::PushAggregator;
use crate::release::{active_releases, determine_latest};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

const RULE: &str = "═══════════════════════════════════════════════════";

/// Run-wide failures. Each one means exit code 1 with no further processing.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persistence(#[from] ManifestError),

    #[error("Failed to scrape releases: {0:#}")]
    Scrape(anyhow::Error),

    #[error("Setup failed: {0:#}")]
    Setup(anyhow::Error),
}

impl From<OrchestratorError> for RunError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Persistence(e) => RunError::Persistence(e),
        }
    }
}

/// Everything the run talks to outside the process.
pub struct Services {
    pub scraper: Arc<dyn ReleaseScraper>,
    pub collaborators: Collaborators,
    pub git: Arc<dyn GitSync>,
    pub progress: Arc<dyn ProgressHandler>,
}

impl Services {
    /// Wire the HTTP, docker and git adapters from configuration.
    pub fn production(config: &AutobuildConfig) -> Result<Self, RunError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RunError::Setup(e.into()))?;

        let pusher = BollardRegistryPusher::connect(&config.image_name).map_err(RunError::Setup)?;
        let health_checker = BollardHealthChecker::connect().map_err(RunError::Setup)?;

        Ok(Self {
            scraper: Arc::new(HttpReleaseScraper::new(
                client.clone(),
                &config.releases_url,
                &config.alpine_mirror,
            )),
            collaborators: Collaborators {
                downloader: Arc::new(HttpRootFsDownloader::new(
                    client,
                    &config.alpine_mirror,
                    &config.cache_root,
                )),
                builder: Arc::new(DockerCliBuilder::new(
                    &config.dockerfile,
                    &config.cache_root,
                    config.architectures.clone(),
                    config.parallel_builds,
                )),
                health_checker: Arc::new(health_checker),
                composer: Arc::new(DockerManifestComposer::new(config.registries.clone())),
                pusher: PushAggregator::new(config.registries.clone(), Arc::new(pusher)),
            },
            git: Arc::new(GitCliSync::new(
                &config.repo_root,
                &config.manifest_git_path,
                &config.git_author_name,
                &config.git_author_email,
            )),
            progress: Arc::new(LoggingHandler),
        })
    }
}

pub fn orchestrator_options(config: &AutobuildConfig) -> OrchestratorOptions {
    OrchestratorOptions {
        image_name: config.image_name.clone(),
        architectures: config.architectures.clone(),
        limit: config.limit,
        health_checks: config.health_checks,
        push: config.do_push,
    }
}

/// Full lifecycle. Per-release failures are inside the returned summary; `Err` is
/// reserved for setup and persistence failures.
pub async fn run(
    config: &AutobuildConfig,
    services: Services,
    today: NaiveDate,
) -> Result<RunSummary, RunError> {
    for dir in [&config.work_root, &config.cache_root] {
        fs::create_dir_all(dir)
            .map_err(|e| RunError::Setup(anyhow::anyhow!("{}: {}", dir.display(), e)))?;
    }
    if config.vuln_scan {
        info!("Vulnerability scanning requested; no scanner is configured, continuing without");
    }

    if seed_from_mirror(&config.manifest_path, &config.manifest_git_path)? {
        info!(
            "Run manifest seeded from {}",
            config.manifest_git_path.display()
        );
    }

    info!("Loading manifest...");
    let mut session = ManifestSession::open(
        ManifestStore::new(&config.manifest_path),
        config.architectures.iter().copied(),
    )?;

    info!("Scraping Alpine releases...");
    let scraped = services.scraper.scrape().await.map_err(RunError::Scrape)?;
    info!("Found {} release versions upstream", scraped.len());

    let active = active_releases(scraped, today);
    info!("Active releases (EOL > {}): {}", today, active.len());

    let added = session.merge(&active, Utc::now())?;
    info!(
        added = added.len(),
        "Manifest saved to {}",
        config.manifest_path.display()
    );

    if images_to_process(session.manifest(), &active).is_empty() {
        info!("✓ Nothing to do: all active versions already pushed");
        log_stats(&stats(session.manifest()));
        return Ok(RunSummary::new(0));
    }

    info!("{}", RULE);
    let orchestrator = BuildOrchestrator::new(orchestrator_options(config), services.collaborators)
        .with_progress(services.progress);
    let summary = orchestrator.run(&mut session, &active).await?;

    if mirror_manifest(session.store().path(), &config.manifest_git_path)? {
        info!(
            "Updated manifest copied to {}",
            config.manifest_git_path.display()
        );
    }

    if config.do_push && config.git_sync {
        let result = services.git.commit_and_push_manifest().await;
        match result.action {
            GitSyncAction::NoChanges => info!("Manifest unchanged, nothing to commit"),
            GitSyncAction::CommittedAndPushed => info!(
                "Manifest pushed: {}",
                result.commit_hash.as_deref().unwrap_or("unknown")
            ),
            GitSyncAction::Failed => error!(
                "Git failed: {}",
                result.error_message.as_deref().unwrap_or("unknown error")
            ),
        }
    } else {
        info!("Skipping git sync");
    }

    log_summary(&summary);
    log_stats(&stats(session.manifest()));
    Ok(summary)
}

/// Copy the run manifest to its version-controlled location when the content differs.
/// Returns whether a copy was written.
pub fn mirror_manifest(source: &Path, target: &Path) -> Result<bool, ManifestError> {
    if source == target {
        return Ok(false);
    }

    let bytes = fs::read(source).map_err(|e| ManifestError::io(source, e))?;
    if fs::read(target).map(|existing| existing == bytes).unwrap_or(false) {
        return Ok(false);
    }

    write_with_parent(target, &bytes)?;
    Ok(true)
}

/// Start a missing run manifest from the version-controlled mirror. Returns whether
/// the mirror was copied.
pub fn seed_from_mirror(run_path: &Path, mirror_path: &Path) -> Result<bool, ManifestError> {
    if run_path == mirror_path || run_path.exists() || !mirror_path.is_file() {
        return Ok(false);
    }

    let bytes = fs::read(mirror_path).map_err(|e| ManifestError::io(mirror_path, e))?;
    write_with_parent(run_path, &bytes)?;
    Ok(true)
}

/// The manifest read-only commands report on: the run copy, or the mirror before any
/// run has produced one.
fn current_manifest_path(config: &AutobuildConfig) -> &Path {
    if config.manifest_path.exists() || !config.manifest_git_path.is_file() {
        &config.manifest_path
    } else {
        &config.manifest_git_path
    }
}

fn write_with_parent(target: &Path, bytes: &[u8]) -> Result<(), ManifestError> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ManifestError::io(parent, e))?;
    }
    write_atomic(target, bytes)
}

/// What a `run` would do right now, computed without writing anything.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub active: Vec<String>,
    pub latest: Option<String>,
    pub added: Vec<String>,
    pub limit: usize,
    pub pending: usize,
    pub images: Vec<ImageEntry>,
}

pub async fn plan(
    config: &AutobuildConfig,
    scraper: &dyn ReleaseScraper,
    today: NaiveDate,
) -> Result<Plan, RunError> {
    let manifest = ManifestStore::new(current_manifest_path(config))
        .load(config.architectures.iter().copied())?;
    let scraped = scraper.scrape().await.map_err(RunError::Scrape)?;
    let active = active_releases(scraped, today);

    let outcome = merge_active_into_manifest(manifest, &active, Utc::now());
    let pending = images_to_process(&outcome.manifest, &active);

    Ok(Plan {
        active: active.iter().map(|r| r.version.clone()).collect(),
        latest: determine_latest(&active),
        added: outcome.added,
        limit: config.limit,
        pending: pending.len(),
        images: pending.into_iter().take(config.limit).collect(),
    })
}

pub fn manifest_stats(config: &AutobuildConfig) -> Result<ManifestStats, RunError> {
    let manifest = ManifestStore::new(current_manifest_path(config))
        .load(config.architectures.iter().copied())?;
    Ok(stats(&manifest))
}

fn log_summary(summary: &RunSummary) {
    info!("{}", RULE);
    info!("Build Summary");
    info!("{}", RULE);
    info!("Processed: {}", summary.processed());
    info!("Success:   {}", summary.success_count());
    info!("Failed:    {}", summary.failure_count());
    if summary.deferred() > 0 {
        warn!("Deferred:  {} (over the limit, next run)", summary.deferred());
    }
    for outcome in summary.outcomes.iter().filter(|o| o.is_failure()) {
        error!(
            version = %outcome.version,
            step = outcome.failed_step.as_deref().unwrap_or("unknown"),
            "{}",
            outcome.error.as_deref().unwrap_or("")
        );
    }
}

fn log_stats(stats: &ManifestStats) {
    info!("Manifest Statistics:");
    info!("  Total:      {}", stats.total);
    info!("  Pushed:     {}", stats.pushed);
    info!("  Built:      {}", stats.built);
    info!("  Downloaded: {}", stats.downloaded);
    info!("  New:        {}", stats.new);
    info!("  Failed:     {}", stats.failed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mirror_copies_only_on_change() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("work/manifest.json");
        let target = dir.path().join("Alpine/manifest.json");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, "{\"a\":1}").unwrap();

        assert!(mirror_manifest(&source, &target).unwrap());
        assert_eq!(fs::read_to_string(&target).unwrap(), "{\"a\":1}");
        assert!(!mirror_manifest(&source, &target).unwrap());
        // Source is copied, not moved.
        assert!(source.exists());
    }

    #[test]
    fn test_mirror_same_path_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(&path, "{}").unwrap();
        assert!(!mirror_manifest(&path, &path).unwrap());
    }

    #[test]
    fn test_seed_copies_mirror_when_run_manifest_missing() {
        let dir = TempDir::new().unwrap();
        let run = dir.path().join(".work/manifest.json");
        let mirror = dir.path().join("Alpine/manifest.json");
        fs::create_dir_all(mirror.parent().unwrap()).unwrap();
        fs::write(&mirror, "{\"images\":{}}").unwrap();

        assert!(seed_from_mirror(&run, &mirror).unwrap());
        assert_eq!(fs::read_to_string(&run).unwrap(), "{\"images\":{}}");

        // An existing run manifest is never replaced.
        fs::write(&run, "{}").unwrap();
        assert!(!seed_from_mirror(&run, &mirror).unwrap());
        assert_eq!(fs::read_to_string(&run).unwrap(), "{}");
    }

    #[test]
    fn test_seed_without_mirror_is_noop() {
        let dir = TempDir::new().unwrap();
        let run = dir.path().join("manifest.json");
        assert!(!seed_from_mirror(&run, &dir.path().join("missing.json")).unwrap());
        assert!(!run.exists());
    }

    #[test]
    fn test_mirror_missing_source_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = mirror_manifest(&dir.path().join("nope.json"), &dir.path().join("t.json"));
        assert!(matches!(result, Err(ManifestError::Io { .. })));
    }
}
