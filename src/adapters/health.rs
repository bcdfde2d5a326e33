use crate::collaborators::{arch_tag, HealthChecker};
use crate::release::{Architecture, ReleaseVersion};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    WaitContainerOptions,
};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs `cat /etc/alpine-release` in the built image and checks the reported release.
pub struct BollardHealthChecker {
    docker: Docker,
}

impl BollardHealthChecker {
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().context("Failed to connect to Docker")?;
        Ok(Self { docker })
    }

    async fn probe(&self, container_id: &str) -> Result<(i64, String)> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .context("Failed to start health check container")?;

        let status_code = match self
            .docker
            .wait_container(container_id, None::<WaitContainerOptions<String>>)
            .next()
            .await
        {
            Some(Ok(response)) => response.status_code,
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => code,
            Some(Err(e)) => return Err(e).context("Failed waiting for health check container"),
            None => bail!("No wait result for health check container"),
        };

        let logs_options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut log_stream = self.docker.logs(container_id, Some(logs_options));
        let mut output = String::new();
        while let Some(log) = log_stream.next().await {
            if let Ok(log_output) = log {
                output.push_str(&log_output.to_string());
            }
        }

        Ok((status_code, output))
    }
}

/// The probe passes when the image reports the same `major.minor` branch as `version`.
pub fn release_matches(output: &str, version: &str) -> bool {
    let reported = output.trim();
    !reported.is_empty()
        && ReleaseVersion::parse(reported).branch() == ReleaseVersion::parse(version).branch()
}

#[async_trait]
impl HealthChecker for BollardHealthChecker {
    async fn check(
        &self,
        image_name: &str,
        version: &str,
        architecture: Architecture,
    ) -> Result<()> {
        let image = format!("{}:{}", image_name, arch_tag(version, architecture));
        let name = format!("alpine-autobuild-health-{}", uuid::Uuid::new_v4().simple());
        debug!(image = %image, container = %name, "Starting health check container");

        let container = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.clone(),
                    platform: Some(architecture.docker_platform().to_string()),
                }),
                Config {
                    image: Some(image.clone()),
                    cmd: Some(vec!["cat".to_string(), "/etc/alpine-release".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .with_context(|| format!("Failed to create container from {}", image))?;

        let result = timeout(PROBE_TIMEOUT, self.probe(&container.id)).await;

        if let Err(e) = self
            .docker
            .remove_container(
                &container.id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            warn!("Failed to remove health check container {}: {}", name, e);
        }

        let (status_code, output) = result
            .with_context(|| format!("Health check of {} timed out", image))??;

        if status_code != 0 {
            bail!(
                "{} exited with status {}: {}",
                image,
                status_code,
                output.trim()
            );
        }
        if !release_matches(&output, version) {
            bail!(
                "{} reports release '{}', expected {}",
                image,
                output.trim(),
                version
            );
        }

        info!(image = %image, "✓ Health check passed ({})", output.trim());
        Ok(())
    }
}
