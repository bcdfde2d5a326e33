use super::step::PipelineStep;
use crate::manifest::ImageStatus;
use serde::Serialize;

/// How one release left the pipeline this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseOutcome {
    pub version: String,
    pub status: ImageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReleaseOutcome {
    pub fn succeeded(version: &str, status: ImageStatus) -> Self {
        Self {
            version: version.to_string(),
            status,
            failed_step: None,
            error: None,
        }
    }

    pub fn failed(version: &str, step: PipelineStep, error: impl Into<String>) -> Self {
        Self {
            version: version.to_string(),
            status: ImageStatus::Failed,
            failed_step: Some(step.label().to_string()),
            error: Some(error.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == ImageStatus::Failed
    }
}

/// Per-run tally; decides the process exit code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Pending releases before the limit was applied.
    pub planned: usize,
    pub outcomes: Vec<ReleaseOutcome>,
}

impl RunSummary {
    pub fn new(planned: usize) -> Self {
        Self {
            planned,
            outcomes: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: ReleaseOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_failure()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    /// Pending releases left for a later run because of the limit.
    pub fn deferred(&self) -> usize {
        self.planned.saturating_sub(self.processed())
    }

    /// `1` when any processed release failed, `0` otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.failure_count() > 0 {
            1
        } else {
            0
        }
    }
}
