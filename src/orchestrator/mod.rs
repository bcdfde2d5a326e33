//! Manifest-driven build orchestration
//!
//! [`BuildOrchestrator`] walks the planned, limit-capped work list one release at a time
//! and drives each through download, build, health check, push and multi-architecture
//! compose. The manifest is persisted after every status change through
//! [`ManifestSession`], so an interrupted run resumes from what is on disk.
//!
//! A step failure is caught at the release boundary: the entry is marked `Failed`, the
//! failure is counted, and the next release starts. Only a manifest write failure stops
//! the run, since later decisions would be made against state that is not on disk.

mod step;
mod summary;

pub use step::{PipelineStep, StepError};
pub use summary::{ReleaseOutcome, RunSummary};

use crate::collaborators::{
    BuiltImage, HealthChecker, ImageBuilder, ManifestComposer, RootFsDownloader,
};
use crate::manifest::{
    images_to_process, ImageEntry, ImageStatus, ManifestError, ManifestSession, Transition,
};
use crate::progress::{LoggingHandler, ProgressEvent, ProgressHandler};
use crate::registry::PushAggregator;
use crate::release::{determine_latest, Architecture, Release};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

/// Run-wide failure. Per-release failures never surface here.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Failed to persist manifest: {0}")]
    Persistence(#[from] ManifestError),
}

#[derive(Debug, Error)]
enum ReleaseError {
    #[error(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    Persistence(#[from] ManifestError),
}

/// Run parameters resolved from configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub image_name: String,
    pub architectures: BTreeSet<Architecture>,
    pub limit: usize,
    pub health_checks: bool,
    /// When false the pipeline stops after the health check and entries stay `Built`.
    pub push: bool,
}

/// Collaborator handles, injected at construction.
pub struct Collaborators {
    pub downloader: Arc<dyn RootFsDownloader>,
    pub builder: Arc<dyn ImageBuilder>,
    pub health_checker: Arc<dyn HealthChecker>,
    pub composer: Arc<dyn ManifestComposer>,
    pub pusher: PushAggregator,
}

pub struct BuildOrchestrator {
    options: OrchestratorOptions,
    collaborators: Collaborators,
    progress: Arc<dyn ProgressHandler>,
}

impl BuildOrchestrator {
    pub fn new(options: OrchestratorOptions, collaborators: Collaborators) -> Self {
        Self {
            options,
            collaborators,
            progress: Arc::new(LoggingHandler),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Process up to `limit` pending releases, strictly one after another.
    pub async fn run(
        &self,
        session: &mut ManifestSession,
        active: &[Release],
    ) -> Result<RunSummary, OrchestratorError> {
        let start = Instant::now();
        let planned = images_to_process(session.manifest(), active);
        let latest = determine_latest(active);
        let batch: Vec<ImageEntry> = planned.iter().take(self.options.limit).cloned().collect();
        let sources: HashMap<&str, &BTreeMap<Architecture, String>> = active
            .iter()
            .map(|release| (release.version.as_str(), &release.downloads))
            .collect();

        self.progress.on_progress(&ProgressEvent::RunStarted {
            planned: planned.len(),
            limit: self.options.limit,
        });

        let mut summary = RunSummary::new(planned.len());

        for (index, image) in batch.iter().enumerate() {
            let release_start = Instant::now();
            self.progress.on_progress(&ProgressEvent::ReleaseStarted {
                version: image.version.clone(),
                status: image.status,
                index: index + 1,
                total: batch.len(),
            });

            let release_sources = sources.get(image.version.as_str()).copied();
            match self
                .process_release(session, image, release_sources, latest.as_deref())
                .await
            {
                Ok(status) => {
                    self.progress.on_progress(&ProgressEvent::ReleaseCompleted {
                        version: image.version.clone(),
                        status,
                        duration: release_start.elapsed(),
                    });
                    summary.push(ReleaseOutcome::succeeded(&image.version, status));
                }
                Err(ReleaseError::Persistence(e)) => return Err(e.into()),
                Err(ReleaseError::Step(e)) => {
                    let message = e.to_string();
                    session.record(
                        &image.version,
                        Transition::Failed {
                            error: message.clone(),
                        },
                    )?;
                    self.progress.on_progress(&ProgressEvent::ReleaseFailed {
                        version: image.version.clone(),
                        step: e.step(),
                        error: message.clone(),
                        duration: release_start.elapsed(),
                    });
                    summary.push(ReleaseOutcome::failed(&image.version, e.step(), message));
                }
            }
        }

        self.progress.on_progress(&ProgressEvent::RunCompleted {
            succeeded: summary.success_count(),
            failed: summary.failure_count(),
            total_time: start.elapsed(),
        });

        Ok(summary)
    }

    async fn process_release(
        &self,
        session: &mut ManifestSession,
        image: &ImageEntry,
        sources: Option<&BTreeMap<Architecture, String>>,
        latest: Option<&str>,
    ) -> Result<ImageStatus, ReleaseError> {
        let version = image.version.as_str();
        let image_name = self.options.image_name.as_str();
        let no_sources = BTreeMap::new();

        self.step_started(version, PipelineStep::Download);
        self.collaborators
            .downloader
            .download_missing(
                image,
                &self.options.architectures,
                sources.unwrap_or(&no_sources),
            )
            .await
            .map_err(StepError::Download)?;
        let entry = session.record(version, Transition::Downloaded)?.clone();

        self.step_started(version, PipelineStep::Build);
        let built = self
            .collaborators
            .builder
            .build(&entry, image_name)
            .await
            .map_err(StepError::Build)?;
        if built.is_empty() {
            return Err(StepError::Build(anyhow::anyhow!("builder produced no images")).into());
        }
        let entry = session
            .record(
                version,
                Transition::Built {
                    architectures: built.keys().copied().collect(),
                    at: Utc::now(),
                },
            )?
            .clone();

        if self.options.health_checks {
            self.step_started(version, PipelineStep::HealthCheck);
            let architecture = representative_architecture(&built);
            self.collaborators
                .health_checker
                .check(image_name, version, architecture)
                .await
                .map_err(|error| StepError::Health {
                    architecture,
                    error,
                })?;
        } else {
            self.step_skipped(version, PipelineStep::HealthCheck, "disabled");
        }

        if !self.options.push {
            self.step_skipped(version, PipelineStep::Push, "push disabled");
            self.step_skipped(version, PipelineStep::Compose, "push disabled");
            return Ok(ImageStatus::Built);
        }

        self.step_started(version, PipelineStep::Push);
        for built_image in built.values() {
            let report = self
                .collaborators
                .pusher
                .push_to_all_registries(built_image)
                .await;
            self.progress.on_progress(&ProgressEvent::PushReported {
                version: version.to_string(),
                report: report.clone(),
            });
            if !report.any_successful() {
                return Err(StepError::Push { report }.into());
            }
        }

        if built.len() > 1 {
            self.step_started(version, PipelineStep::Compose);
            let is_latest = latest == Some(version);
            let architectures: Vec<Architecture> = built.keys().copied().collect();
            debug!(version, is_latest, "Composing {} architectures", architectures.len());
            self.collaborators
                .composer
                .compose(&entry, image_name, &architectures, is_latest)
                .await
                .map_err(StepError::Compose)?;
        } else {
            self.step_skipped(version, PipelineStep::Compose, "single architecture");
        }

        session.record(version, Transition::Pushed { at: Utc::now() })?;
        Ok(ImageStatus::Pushed)
    }

    fn step_started(&self, version: &str, step: PipelineStep) {
        self.progress.on_progress(&ProgressEvent::StepStarted {
            version: version.to_string(),
            step,
        });
    }

    fn step_skipped(&self, version: &str, step: PipelineStep, reason: &str) {
        self.progress.on_progress(&ProgressEvent::StepSkipped {
            version: version.to_string(),
            step,
            reason: reason.to_string(),
        });
    }
}

/// The one architecture probed by the health check: `x86_64` when built, otherwise
/// the first built architecture.
pub fn representative_architecture(built: &BTreeMap<Architecture, BuiltImage>) -> Architecture {
    if built.contains_key(&Architecture::X86_64) {
        return Architecture::X86_64;
    }
    built
        .keys()
        .next()
        .copied()
        .unwrap_or(Architecture::X86_64)
}
