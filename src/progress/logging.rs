//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{error, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { planned, limit } => {
                info!(planned, limit, "Images to process: {} (limit {})", planned, limit);
            }
            ProgressEvent::ReleaseStarted {
                version,
                status,
                index,
                total,
            } => {
                info!(
                    version = %version,
                    status = %status,
                    progress = format!("{}/{}", index, total),
                    "Processing image"
                );
            }
            ProgressEvent::StepStarted { version, step } => {
                info!(version = %version, "  [{}/5] {}...", step.number(), step.label());
            }
            ProgressEvent::StepSkipped {
                version,
                step,
                reason,
            } => {
                info!(
                    version = %version,
                    "  [{}/5] Skipping {} ({})",
                    step.number(),
                    step.label().to_lowercase(),
                    reason
                );
            }
            ProgressEvent::PushReported { version, report } => {
                info!(version = %version, "{}", report.format_report());
                if report.all_successful() {
                    info!(
                        version = %version,
                        "✓ Successfully pushed to {}/{} registries",
                        report.success_count(),
                        report.total()
                    );
                } else if report.any_successful() {
                    warn!(
                        version = %version,
                        "Partial push: {}/{} registries accepted {}",
                        report.success_count(),
                        report.total(),
                        report.image
                    );
                }
            }
            ProgressEvent::ReleaseCompleted {
                version,
                status,
                duration,
            } => {
                info!(
                    version = %version,
                    status = %status,
                    duration_ms = duration.as_millis(),
                    "✓ Image complete"
                );
            }
            ProgressEvent::ReleaseFailed {
                version,
                step,
                error,
                duration,
            } => {
                error!(
                    version = %version,
                    step = step.label(),
                    duration_ms = duration.as_millis(),
                    "✗ FAILED: {}",
                    error
                );
            }
            ProgressEvent::RunCompleted {
                succeeded,
                failed,
                total_time,
            } => {
                info!(
                    succeeded,
                    failed,
                    total_time_ms = total_time.as_millis(),
                    "Run complete"
                );
            }
        }
    }
}
