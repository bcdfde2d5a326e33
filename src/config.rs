//! Configuration management for alpine-autobuild
//!
//! Every setting is resolved once at startup from environment variables and threaded
//! through the run as a value. Nothing downstream reads the environment.
//!
//! # Environment Variables
//!
//! ## Paths
//! - `REPO_ROOT` / `GITHUB_WORKSPACE`: repository root - default: current directory
//! - `DOCKERFILE`: Dockerfile used for builds - default: `<root>/Alpine/Dockerfile`
//! - `CACHE_ROOT`: rootfs archive cache - default: `<root>/.cache/rootfs`
//! - `WORK_ROOT`: working directory - default: `<root>/.work`
//! - `MANIFEST_PATH`: manifest used during the run - default: `<work>/manifest.json`
//! - `MANIFEST_GIT_PATH`: version-controlled copy - default: `<root>/Alpine/manifest.json`
//!
//! ## Pipeline
//! - `ALPINE_ARCHITECTURES`: comma-separated architectures - default: `x86_64,aarch64`
//! - `IMAGE_NAME`: image repository name - default: `alpine`
//! - `LIMIT`: releases processed per run - default: `5`
//! - `DO_PUSH`: push, compose and commit results - default: `true`
//! - `ENABLE_HEALTH_CHECKS`: run the health check step - default: `true`
//! - `ENABLE_PARALLEL_BUILDS`: build architectures concurrently - default: `true`
//! - `ENABLE_VULN_SCAN`: reported only - default: `true`
//!
//! ## Upstream
//! - `ALPINE_MIRROR`: rootfs mirror - default: `https://dl-cdn.alpinelinux.org/alpine`
//! - `ALPINE_RELEASES_URL`: release listing - default: `https://alpinelinux.org/releases.json`
//! - `HTTP_TIMEOUT_SECS`: HTTP request timeout - default: `300`
//!
//! ## Registries
//! - `DOCKER_USERNAME`, `DOCKER_PASSWORD`, `DOCKER_NAMESPACE`: Docker Hub, required when pushing
//! - `GHCR_USERNAME`, `GHCR_TOKEN`, `GHCR_NAMESPACE`: optional GitHub Container Registry
//!
//! ## Git
//! - `GIT_SYNC`: commit and push the manifest - default: `true`
//! - `GIT_AUTHOR_NAME` / `GIT_AUTHOR_EMAIL`: commit identity - default: `github-actions[bot]`

use crate::registry::Registry;
use crate::release::Architecture;
use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_ARCHITECTURES: &str = "x86_64,aarch64";
const DEFAULT_IMAGE_NAME: &str = "alpine";
const DEFAULT_LIMIT: usize = 5;
const DEFAULT_MIRROR: &str = "https://dl-cdn.alpinelinux.org/alpine";
const DEFAULT_RELEASES_URL: &str = "https://alpinelinux.org/releases.json";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;
const DEFAULT_GIT_AUTHOR_NAME: &str = "github-actions[bot]";
const DEFAULT_GIT_AUTHOR_EMAIL: &str = "github-actions[bot]@users.noreply.github.com";

/// Configuration errors. Any of these aborts the run before a release is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    MissingSetting(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct AutobuildConfig {
    pub repo_root: PathBuf,
    pub architectures: BTreeSet<Architecture>,
    pub image_name: String,
    pub dockerfile: PathBuf,
    pub limit: usize,
    pub do_push: bool,
    pub health_checks: bool,
    pub parallel_builds: bool,
    pub vuln_scan: bool,
    pub cache_root: PathBuf,
    pub work_root: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest_git_path: PathBuf,
    pub alpine_mirror: String,
    pub releases_url: String,
    pub http_timeout_secs: u64,
    pub registries: Vec<Registry>,
    pub git_sync: bool,
    pub git_author_name: String,
    pub git_author_email: String,
}

impl AutobuildConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let repo_root = get("REPO_ROOT")
            .or_else(|| get("GITHUB_WORKSPACE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let architectures = parse_architectures(
            &get("ALPINE_ARCHITECTURES").unwrap_or_else(|| DEFAULT_ARCHITECTURES.to_string()),
        )?;

        let limit = get("LIMIT").map_or(DEFAULT_LIMIT, |raw| parse_limit(&raw));

        let work_root = get("WORK_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| repo_root.join(".work"));

        let do_push = parse_bool("DO_PUSH", get("DO_PUSH"), true)?;

        Ok(Self {
            architectures,
            image_name: get("IMAGE_NAME").unwrap_or_else(|| DEFAULT_IMAGE_NAME.to_string()),
            dockerfile: get("DOCKERFILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| repo_root.join("Alpine").join("Dockerfile")),
            limit,
            do_push,
            health_checks: parse_bool("ENABLE_HEALTH_CHECKS", get("ENABLE_HEALTH_CHECKS"), true)?,
            parallel_builds: parse_bool(
                "ENABLE_PARALLEL_BUILDS",
                get("ENABLE_PARALLEL_BUILDS"),
                true,
            )?,
            vuln_scan: parse_bool("ENABLE_VULN_SCAN", get("ENABLE_VULN_SCAN"), true)?,
            cache_root: get("CACHE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| repo_root.join(".cache").join("rootfs")),
            manifest_path: get("MANIFEST_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| work_root.join("manifest.json")),
            manifest_git_path: get("MANIFEST_GIT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| repo_root.join("Alpine").join("manifest.json")),
            work_root,
            alpine_mirror: get("ALPINE_MIRROR").unwrap_or_else(|| DEFAULT_MIRROR.to_string()),
            releases_url: get("ALPINE_RELEASES_URL")
                .unwrap_or_else(|| DEFAULT_RELEASES_URL.to_string()),
            http_timeout_secs: match get("HTTP_TIMEOUT_SECS") {
                Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::ParseError {
                    field: "HTTP_TIMEOUT_SECS".to_string(),
                    error: e.to_string(),
                })?,
                None => DEFAULT_HTTP_TIMEOUT_SECS,
            },
            registries: resolve_registries(&get)?,
            git_sync: parse_bool("GIT_SYNC", get("GIT_SYNC"), true)?,
            git_author_name: get("GIT_AUTHOR_NAME")
                .unwrap_or_else(|| DEFAULT_GIT_AUTHOR_NAME.to_string()),
            git_author_email: get("GIT_AUTHOR_EMAIL")
                .unwrap_or_else(|| DEFAULT_GIT_AUTHOR_EMAIL.to_string()),
            repo_root,
        })
    }

    /// Validates the configuration
    ///
    /// Checks that at least one architecture is tracked, that pushing has somewhere to
    /// push to, and that the HTTP timeout is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.architectures.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "At least one architecture must be configured".to_string(),
            ));
        }

        if self.image_name.contains(':') || self.image_name.contains('/') {
            return Err(ConfigError::ValidationFailed(format!(
                "IMAGE_NAME must be a bare repository name, got '{}'",
                self.image_name
            )));
        }

        if self.do_push && !self.registries.iter().any(Registry::is_docker_hub) {
            return Err(ConfigError::MissingSetting(
                "DOCKER_USERNAME, DOCKER_PASSWORD and DOCKER_NAMESPACE (required when DO_PUSH=true)"
                    .to_string(),
            ));
        }

        if self.http_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "HTTP timeout must be at least 1 second".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_architectures(raw: &str) -> Result<BTreeSet<Architecture>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Architecture>()
                .map_err(|error| ConfigError::ParseError {
                    field: "ALPINE_ARCHITECTURES".to_string(),
                    error,
                })
        })
        .collect()
}

/// Negative limits process nothing; anything unreadable falls back to the default.
fn parse_limit(raw: &str) -> usize {
    match raw.parse::<i64>() {
        Ok(n) if n < 0 => 0,
        Ok(n) => usize::try_from(n).unwrap_or(usize::MAX),
        Err(_) => DEFAULT_LIMIT,
    }
}

fn parse_bool(field: &str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };

    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::ParseError {
            field: field.to_string(),
            error: format!("expected true/false, got '{}'", raw),
        }),
    }
}

fn resolve_registries<F>(get: &F) -> Result<Vec<Registry>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut registries = Vec::new();

    let hub = [
        get("DOCKER_USERNAME"),
        get("DOCKER_PASSWORD"),
        get("DOCKER_NAMESPACE"),
    ];
    match hub {
        [Some(username), Some(password), Some(namespace)] => {
            registries.push(Registry::docker_hub(username, password, namespace));
        }
        [None, None, None] => {}
        [username, password, _] => {
            let missing = if username.is_none() {
                "DOCKER_USERNAME"
            } else if password.is_none() {
                "DOCKER_PASSWORD"
            } else {
                "DOCKER_NAMESPACE"
            };
            return Err(ConfigError::MissingSetting(missing.to_string()));
        }
    }

    if let Some(token) = get("GHCR_TOKEN") {
        let username = get("GHCR_USERNAME")
            .ok_or_else(|| ConfigError::MissingSetting("GHCR_USERNAME".to_string()))?;
        let namespace = get("GHCR_NAMESPACE").unwrap_or_else(|| username.clone());
        registries.push(Registry::ghcr(username, token, namespace));
    }

    Ok(registries)
}

impl fmt::Display for AutobuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let architectures: Vec<&str> = self.architectures.iter().map(|a| a.as_str()).collect();
        let registries: Vec<&str> = self.registries.iter().map(|r| r.name.as_str()).collect();

        writeln!(f, "Configuration loaded:")?;
        writeln!(f, "  Architectures: {}", architectures.join(", "))?;
        writeln!(f, "  Image name: {}", self.image_name)?;
        writeln!(f, "  Push enabled: {}", self.do_push)?;
        writeln!(f, "  Registries: {}", registries.join(", "))?;
        writeln!(f, "  Dockerfile: {}", self.dockerfile.display())?;
        writeln!(f, "  Parallel builds: {}", self.parallel_builds)?;
        writeln!(f, "  Health checks: {}", self.health_checks)?;
        writeln!(f, "  Vulnerability scanning: {}", self.vuln_scan)?;
        writeln!(f, "  Rootfs cache: {}", self.cache_root.display())?;
        writeln!(f, "  Manifest: {}", self.manifest_path.display())?;
        writeln!(f, "  Manifest git path: {}", self.manifest_git_path.display())?;
        write!(f, "  Limit: {}", self.limit)
    }
}
