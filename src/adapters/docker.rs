//! Image build and multi-architecture compose through the docker CLI
//!
//! Builds go through `docker buildx build --load`, one invocation per architecture, with
//! the cached rootfs directory as build context. Composition uses
//! `docker buildx imagetools create`, which needs the per-architecture tags to already
//! be pushed.

use super::command::{args, run};
use super::downloader::release_cache_dir;
use crate::collaborators::{arch_tag, BuiltImage, ImageBuilder, ManifestComposer};
use crate::manifest::ImageEntry;
use crate::registry::Registry;
use crate::release::{rootfs_file_name, Architecture};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DOCKER: &str = "docker";

pub struct DockerCliBuilder {
    dockerfile: PathBuf,
    cache_root: PathBuf,
    architectures: BTreeSet<Architecture>,
    parallel: bool,
}

impl DockerCliBuilder {
    pub fn new(
        dockerfile: impl Into<PathBuf>,
        cache_root: impl Into<PathBuf>,
        architectures: BTreeSet<Architecture>,
        parallel: bool,
    ) -> Self {
        Self {
            dockerfile: dockerfile.into(),
            cache_root: cache_root.into(),
            architectures,
            parallel,
        }
    }

    async fn build_one(
        &self,
        image_name: &str,
        version: &str,
        arch: Architecture,
    ) -> Result<(Architecture, BuiltImage)> {
        let image = BuiltImage::new(image_name, version, arch);
        let context = release_cache_dir(&self.cache_root, version);

        info!(version, arch = %arch, "Building {}", image.reference);
        run(
            DOCKER,
            &build_args(&self.dockerfile, &context, &image, arch),
            None,
            None,
        )
        .await
        .with_context(|| format!("docker buildx build of {} failed", image.reference))?;

        Ok((arch, image))
    }
}

fn build_args(
    dockerfile: &Path,
    context: &Path,
    image: &BuiltImage,
    arch: Architecture,
) -> Vec<String> {
    args([
        "buildx".to_string(),
        "build".to_string(),
        "--platform".to_string(),
        arch.docker_platform().to_string(),
        "--load".to_string(),
        "--file".to_string(),
        dockerfile.display().to_string(),
        "--tag".to_string(),
        image.reference.clone(),
        "--build-arg".to_string(),
        format!("ALPINE_VERSION={}", image.version),
        "--build-arg".to_string(),
        format!("ALPINE_ARCH={}", arch),
        "--build-arg".to_string(),
        format!("ROOTFS={}", rootfs_file_name(&image.version, arch)),
        context.display().to_string(),
    ])
}

#[async_trait]
impl ImageBuilder for DockerCliBuilder {
    async fn build(
        &self,
        entry: &ImageEntry,
        image_name: &str,
    ) -> Result<BTreeMap<Architecture, BuiltImage>> {
        if self.architectures.is_empty() {
            bail!("no architectures configured");
        }

        let built = if self.parallel {
            try_join_all(
                self.architectures
                    .iter()
                    .map(|arch| self.build_one(image_name, &entry.version, *arch)),
            )
            .await?
        } else {
            let mut built = Vec::with_capacity(self.architectures.len());
            for arch in &self.architectures {
                built.push(self.build_one(image_name, &entry.version, *arch).await?);
            }
            built
        };

        Ok(built.into_iter().collect())
    }
}

/// Publishes `<repo>:<version>` (and `<repo>:latest`) over the pushed per-arch tags in
/// every registry.
pub struct DockerManifestComposer {
    registries: Vec<Registry>,
}

impl DockerManifestComposer {
    pub fn new(registries: Vec<Registry>) -> Self {
        Self { registries }
    }

    async fn login(&self, registry: &Registry) -> Result<()> {
        let Some(credentials) = &registry.credentials else {
            return Ok(());
        };
        run(
            DOCKER,
            &args([
                "login",
                registry.host.as_str(),
                "--username",
                credentials.username.as_str(),
                "--password-stdin",
            ]),
            None,
            Some(&credentials.password),
        )
        .await
        .with_context(|| format!("docker login to {} failed", registry.host))?;
        Ok(())
    }
}

fn compose_args(
    repository: &str,
    version: &str,
    architectures: &[Architecture],
    is_latest: bool,
) -> Vec<String> {
    let mut list = args(["buildx", "imagetools", "create"]);
    list.push("--tag".to_string());
    list.push(format!("{}:{}", repository, version));
    if is_latest {
        list.push("--tag".to_string());
        list.push(format!("{}:latest", repository));
    }
    list.extend(
        architectures
            .iter()
            .map(|arch| format!("{}:{}", repository, arch_tag(version, *arch))),
    );
    list
}

#[async_trait]
impl ManifestComposer for DockerManifestComposer {
    async fn compose(
        &self,
        entry: &ImageEntry,
        image_name: &str,
        architectures: &[Architecture],
        is_latest: bool,
    ) -> Result<()> {
        let mut failures = Vec::new();

        for registry in &self.registries {
            let repository = registry.repository(image_name);
            debug!(registry = %registry.name, "Composing {}:{}", repository, entry.version);

            let result = match self.login(registry).await {
                Ok(()) => {
                    run(
                        DOCKER,
                        &compose_args(&repository, &entry.version, architectures, is_latest),
                        None,
                        None,
                    )
                    .await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(_) => info!(
                    registry = %registry.name,
                    latest = is_latest,
                    "✓ Manifest {}:{} created",
                    repository,
                    entry.version
                ),
                Err(e) => {
                    warn!(registry = %registry.name, "Manifest compose failed: {:#}", e);
                    failures.push(format!("{}: {:#}", registry.name, e));
                }
            }
        }

        if !failures.is_empty() && failures.len() == self.registries.len() {
            bail!("compose failed in every registry: {}", failures.join("; "));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let image = BuiltImage::new("alpine", "3.20.3", Architecture::Aarch64);
        let list = build_args(
            Path::new("/repo/Alpine/Dockerfile"),
            Path::new("/cache/3.20.3"),
            &image,
            Architecture::Aarch64,
        );

        assert_eq!(&list[..2], &["buildx", "build"]);
        assert!(list.contains(&"linux/arm64".to_string()));
        assert!(list.contains(&"alpine:3.20.3-aarch64".to_string()));
        assert!(list.contains(&"ROOTFS=alpine-minirootfs-3.20.3-aarch64.tar.gz".to_string()));
        assert_eq!(list.last().map(String::as_str), Some("/cache/3.20.3"));
    }

    #[test]
    fn test_compose_args_with_latest() {
        let list = compose_args(
            "docker.io/acme/alpine",
            "3.20.3",
            &[Architecture::X86_64, Architecture::Aarch64],
            true,
        );
        assert!(list.contains(&"docker.io/acme/alpine:3.20.3".to_string()));
        assert!(list.contains(&"docker.io/acme/alpine:latest".to_string()));
        assert!(list.contains(&"docker.io/acme/alpine:3.20.3-x86_64".to_string()));
        assert!(list.contains(&"docker.io/acme/alpine:3.20.3-aarch64".to_string()));
    }

    #[test]
    fn test_compose_args_without_latest() {
        let list = compose_args("ghcr.io/acme/alpine", "3.19.4", &[Architecture::X86_64], false);
        assert!(!list.iter().any(|a| a.ends_with(":latest")));
    }
}
