use crate::release::Architecture;
use crate::registry::PushReport;
use std::fmt;
use thiserror::Error;

/// The five pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    Download,
    Build,
    HealthCheck,
    Push,
    Compose,
}

impl PipelineStep {
    pub fn number(&self) -> usize {
        match self {
            PipelineStep::Download => 1,
            PipelineStep::Build => 2,
            PipelineStep::HealthCheck => 3,
            PipelineStep::Push => 4,
            PipelineStep::Compose => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineStep::Download => "Downloading rootfs",
            PipelineStep::Build => "Building images",
            PipelineStep::HealthCheck => "Health check",
            PipelineStep::Push => "Pushing to registries",
            PipelineStep::Compose => "Creating multi-architecture manifest",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A step's failure. Always scoped to one release.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Download failed: {0:#}")]
    Download(anyhow::Error),

    #[error("Build failed: {0:#}")]
    Build(anyhow::Error),

    #[error("Health check failed on {architecture}: {error:#}")]
    Health {
        architecture: Architecture,
        error: anyhow::Error,
    },

    #[error("Failed to push {} to any registry ({} attempted)", .report.image, .report.total())]
    Push { report: PushReport },

    #[error("Manifest compose failed: {0:#}")]
    Compose(anyhow::Error),
}

impl StepError {
    pub fn step(&self) -> PipelineStep {
        match self {
            StepError::Download(_) => PipelineStep::Download,
            StepError::Build(_) => PipelineStep::Build,
            StepError::Health { .. } => PipelineStep::HealthCheck,
            StepError::Push { .. } => PipelineStep::Push,
            StepError::Compose(_) => PipelineStep::Compose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_step_numbers_are_sequential() {
        let steps = [
            PipelineStep::Download,
            PipelineStep::Build,
            PipelineStep::HealthCheck,
            PipelineStep::Push,
            PipelineStep::Compose,
        ];
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(step.number(), i + 1);
        }
    }

    #[test]
    fn test_step_error_message_keeps_context_chain() {
        let err = StepError::Build(anyhow!("exit status 1").context("docker buildx build"));
        let message = err.to_string();
        assert!(message.contains("docker buildx build"));
        assert!(message.contains("exit status 1"));
        assert_eq!(err.step(), PipelineStep::Build);
    }

    #[test]
    fn test_push_error_message() {
        let err = StepError::Push {
            report: PushReport {
                image: "alpine:3.19.1-x86_64".to_string(),
                outcomes: Vec::new(),
            },
        };
        assert!(err.to_string().contains("alpine:3.19.1-x86_64"));
        assert_eq!(err.step(), PipelineStep::Push);
    }
}
