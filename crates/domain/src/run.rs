use serde::{Deserialize, Serialize};
use tempora_core::{AppError, AppResult};

/// Lifecycle status of one long-running orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationRunStatus {
    /// Run requested but not yet picked up.
    Queued,
    /// Run is executing and reporting step progress.
    Running,
    /// Run finished successfully.
    Completed,
    /// Run finished with an error.
    Failed,
}

impl OrchestrationRunStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown orchestration run status '{value}'"
            ))),
        }
    }

    /// Returns whether the run still occupies the single-flight slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// Returns whether the status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns whether a transition to `next` is allowed.
    ///
    /// Queued may only start running; Running may only finish; terminal
    /// states accept no further transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Running),
            Self::Running => matches!(next, Self::Completed | Self::Failed),
            Self::Completed | Self::Failed => false,
        }
    }
}

/// Result counters accumulated by one orchestration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationCounters {
    /// Accounts synchronized from the upstream source.
    pub accounts_synced: i64,
    /// Job definitions created during the run.
    pub jobs_created: i64,
    /// Job definitions updated during the run.
    pub jobs_updated: i64,
    /// Job definitions removed during the run.
    pub jobs_removed: i64,
}
