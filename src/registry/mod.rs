//! Multi-registry push and result aggregation
//!
//! A built image is pushed to every configured registry in turn. One registry failing
//! never stops the others; the per-registry outcomes are folded into a [`PushReport`]
//! whose single verdict is "did at least one registry accept it".

use crate::collaborators::BuiltImage;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DOCKER_HUB_HOST: &str = "docker.io";
pub const GHCR_HOST: &str = "ghcr.io";

#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A push target: host, namespace and the credentials to use there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    pub name: String,
    pub host: String,
    pub namespace: String,
    pub credentials: Option<RegistryCredentials>,
}

impl Registry {
    pub fn docker_hub(
        username: impl Into<String>,
        password: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            name: "Docker Hub".to_string(),
            host: DOCKER_HUB_HOST.to_string(),
            namespace: namespace.into(),
            credentials: Some(RegistryCredentials {
                username: username.into(),
                password: password.into(),
            }),
        }
    }

    pub fn ghcr(
        username: impl Into<String>,
        token: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            name: "GitHub Container Registry".to_string(),
            host: GHCR_HOST.to_string(),
            namespace: namespace.into(),
            credentials: Some(RegistryCredentials {
                username: username.into(),
                password: token.into(),
            }),
        }
    }

    pub fn is_docker_hub(&self) -> bool {
        self.host == DOCKER_HUB_HOST
    }

    /// Fully qualified repository for an image name, e.g. `docker.io/acme/alpine`.
    pub fn repository(&self, image_name: &str) -> String {
        if self.namespace.is_empty() {
            format!("{}/{}", self.host, image_name)
        } else {
            format!("{}/{}/{}", self.host, self.namespace, image_name)
        }
    }
}

/// Pushes one image to one registry. Returns a short success message.
#[async_trait]
pub trait RegistryPusher: Send + Sync {
    async fn push(&self, image: &BuiltImage, registry: &Registry) -> Result<String>;
}

/// One registry's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushOutcome {
    pub registry: String,
    pub success: bool,
    pub message: String,
}

/// Reduction over every registry's outcome for one image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub image: String,
    pub outcomes: Vec<PushOutcome>,
}

impl PushReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn any_successful(&self) -> bool {
        self.success_count() > 0
    }

    pub fn all_successful(&self) -> bool {
        self.total() > 0 && self.success_count() == self.total()
    }

    /// Per-registry breakdown for logs.
    pub fn format_report(&self) -> String {
        let mut report = format!(
            "Push report for {} ({}/{} registries):",
            self.image,
            self.success_count(),
            self.total()
        );
        for outcome in &self.outcomes {
            report.push_str(&format!(
                "\n  {} {}: {}",
                if outcome.success { "✓" } else { "✗" },
                outcome.registry,
                outcome.message
            ));
        }
        report
    }
}

/// Pushes a built image to every configured registry.
pub struct PushAggregator {
    registries: Vec<Registry>,
    pusher: Arc<dyn RegistryPusher>,
}

impl PushAggregator {
    pub fn new(registries: Vec<Registry>, pusher: Arc<dyn RegistryPusher>) -> Self {
        Self { registries, pusher }
    }

    pub fn registries(&self) -> &[Registry] {
        &self.registries
    }

    pub async fn push_to_all_registries(&self, image: &BuiltImage) -> PushReport {
        let mut outcomes = Vec::with_capacity(self.registries.len());

        for registry in &self.registries {
            debug!("Pushing {} to {}", image.reference, registry.name);
            let outcome = match self.pusher.push(image, registry).await {
                Ok(message) => PushOutcome {
                    registry: registry.name.clone(),
                    success: true,
                    message,
                },
                Err(e) => {
                    warn!("Push of {} to {} failed: {:#}", image.reference, registry.name, e);
                    PushOutcome {
                        registry: registry.name.clone(),
                        success: false,
                        message: format!("{:#}", e),
                    }
                }
            };
            outcomes.push(outcome);
        }

        PushReport {
            image: image.reference.clone(),
            outcomes,
        }
    }
}
