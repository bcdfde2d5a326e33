//! Progress handler trait and events

use crate::manifest::ImageStatus;
use crate::orchestrator::PipelineStep;
use crate::registry::PushReport;
use std::time::Duration;

/// Events emitted while the orchestrator works through a run
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Work list resolved
    RunStarted { planned: usize, limit: usize },

    /// A release entered the pipeline
    ReleaseStarted {
        version: String,
        status: ImageStatus,
        index: usize,
        total: usize,
    },

    /// A pipeline step is about to run
    StepStarted { version: String, step: PipelineStep },

    /// A pipeline step was skipped on purpose (disabled, single architecture)
    StepSkipped {
        version: String,
        step: PipelineStep,
        reason: String,
    },

    /// One built image was pushed to every registry
    PushReported { version: String, report: PushReport },

    /// A release left the pipeline without error
    ReleaseCompleted {
        version: String,
        status: ImageStatus,
        duration: Duration,
    },

    /// A release failed and was marked failed
    ReleaseFailed {
        version: String,
        step: PipelineStep,
        error: String,
        duration: Duration,
    },

    /// The capped work list is exhausted
    RunCompleted {
        succeeded: usize,
        failed: usize,
        total_time: Duration,
    },
}

/// Trait for handling progress events during a run
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
