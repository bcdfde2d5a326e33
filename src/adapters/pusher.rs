use crate::collaborators::BuiltImage;
use crate::registry::{Registry, RegistryPusher};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::image::{PushImageOptions, TagImageOptions};
use bollard::Docker;
use futures_util::stream::StreamExt;
use tracing::debug;

/// Tags a local image into a registry repository and pushes it through the Docker daemon.
pub struct BollardRegistryPusher {
    docker: Docker,
    image_name: String,
}

impl BollardRegistryPusher {
    pub fn connect(image_name: impl Into<String>) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().context("Failed to connect to Docker")?;
        Ok(Self {
            docker,
            image_name: image_name.into(),
        })
    }
}

fn credentials(registry: &Registry) -> Option<DockerCredentials> {
    registry.credentials.as_ref().map(|c| DockerCredentials {
        username: Some(c.username.clone()),
        password: Some(c.password.clone()),
        serveraddress: Some(registry.host.clone()),
        ..Default::default()
    })
}

#[async_trait]
impl RegistryPusher for BollardRegistryPusher {
    async fn push(&self, image: &BuiltImage, registry: &Registry) -> Result<String> {
        let repository = registry.repository(&self.image_name);
        let tag = image.tag();

        self.docker
            .tag_image(
                &image.reference,
                Some(TagImageOptions {
                    repo: repository.clone(),
                    tag: tag.clone(),
                }),
            )
            .await
            .with_context(|| {
                format!("Failed to tag {} as {}:{}", image.reference, repository, tag)
            })?;

        let mut stream = self.docker.push_image(
            &repository,
            Some(PushImageOptions { tag: tag.clone() }),
            credentials(registry),
        );

        let mut digest = None;
        while let Some(item) = stream.next().await {
            let info = item.with_context(|| format!("Push of {}:{} failed", repository, tag))?;
            if let Some(error) = info.error {
                bail!("{}", error);
            }
            if let Some(status) = info.status {
                debug!(registry = %registry.name, "{}", status);
                if let Some(rest) = status.split("digest: ").nth(1) {
                    digest = rest.split_whitespace().next().map(str::to_string);
                }
            }
        }

        Ok(match digest {
            Some(d) => format!("pushed {}:{} ({})", repository, tag, d),
            None => format!("pushed {}:{}", repository, tag),
        })
    }
}
