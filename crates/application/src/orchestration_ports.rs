use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tempora_core::AppResult;
use tempora_domain::{OrchestrationCounters, OrchestrationRunStatus};
use uuid::Uuid;

/// Persisted record of one long-running orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestrationRun {
    /// Stable run identifier.
    pub run_id: Uuid,
    /// Current lifecycle status.
    pub status: OrchestrationRunStatus,
    /// When the run was requested.
    pub requested_at: DateTime<Utc>,
    /// Terminal timestamp; set exactly when the status is terminal.
    pub completed_at: Option<DateTime<Utc>>,
    /// Step label reported while running.
    pub current_step: Option<String>,
    /// Progress value reported while running.
    pub current_progress: Option<i32>,
    /// Failure details for failed runs.
    pub error_message: Option<String>,
    /// Result counters accumulated by the run.
    pub counters: OrchestrationCounters,
}

impl OrchestrationRun {
    /// Returns whether the run still occupies the single-flight slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Terminal completion payload for one orchestration run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteOrchestrationRunInput {
    /// Run identifier.
    pub run_id: Uuid,
    /// Terminal status, Completed or Failed.
    pub status: OrchestrationRunStatus,
    /// Terminal timestamp.
    pub completed_at: DateTime<Utc>,
    /// Final result counters.
    pub counters: OrchestrationCounters,
    /// Failure details for failed runs.
    pub error_message: Option<String>,
}

/// Repository port for the orchestration run state machine.
///
/// The single-flight guard is the repository's responsibility and must be
/// durable: at most one run may be queued or running system-wide, enforced
/// atomically so concurrent requests cannot both start.
#[async_trait]
pub trait OrchestrationRunRepository: Send + Sync {
    /// Atomically creates a queued run, or returns `AppError::Conflict`
    /// when another run is still queued or running.
    async fn try_begin_run(&self, requested_at: DateTime<Utc>) -> AppResult<OrchestrationRun>;

    /// Transitions a queued run to running.
    async fn mark_running(&self, run_id: Uuid) -> AppResult<OrchestrationRun>;

    /// Updates step and progress of a running run.
    async fn update_progress(&self, run_id: Uuid, step: &str, progress: i32) -> AppResult<()>;

    /// Transitions a running run to its terminal status, setting the
    /// terminal timestamp.
    async fn complete_run(&self, input: CompleteOrchestrationRunInput)
    -> AppResult<OrchestrationRun>;

    /// Returns the most recently requested run.
    async fn find_latest_run(&self) -> AppResult<Option<OrchestrationRun>>;

    /// Returns the most recently completed (successful) run.
    async fn find_latest_completed_run(&self) -> AppResult<Option<OrchestrationRun>>;
}
