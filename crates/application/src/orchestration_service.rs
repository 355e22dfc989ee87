use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tempora_core::{AppError, AppResult, NonEmptyString};
use tempora_domain::{OrchestrationCounters, OrchestrationRunStatus};
use uuid::Uuid;

use crate::orchestration_ports::{
    CompleteOrchestrationRunInput, OrchestrationRun, OrchestrationRunRepository,
};

/// Health classification of the orchestration run history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationHealthStatus {
    /// A run is currently queued or running.
    InProgress,
    /// The latest completed run finished within the staleness threshold.
    Healthy,
    /// The latest completed run is older than the staleness threshold.
    Stale,
    /// No run has ever completed successfully.
    NeverCompleted,
}

/// Health report derived from the most recent orchestration runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestrationHealth {
    /// Health classification.
    pub status: OrchestrationHealthStatus,
    /// Completion time of the latest successful run, when one exists.
    pub last_completed_at: Option<DateTime<Utc>>,
    /// Error detail of the latest run when it failed.
    pub last_error: Option<String>,
}

impl OrchestrationHealth {
    /// Returns whether the report counts as healthy: a run in progress or
    /// a sufficiently recent successful completion.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(
            self.status,
            OrchestrationHealthStatus::InProgress | OrchestrationHealthStatus::Healthy
        )
    }
}

/// Tracks the lifecycle of long-running orchestration runs and reports
/// their health to external monitoring.
#[derive(Clone)]
pub struct OrchestrationRunService {
    repository: Arc<dyn OrchestrationRunRepository>,
}

impl OrchestrationRunService {
    /// Creates an orchestration run service.
    #[must_use]
    pub fn new(repository: Arc<dyn OrchestrationRunRepository>) -> Self {
        Self { repository }
    }

    /// Requests a new run; rejected with `AppError::Conflict` while another
    /// run is queued or running.
    pub async fn request_run(&self) -> AppResult<OrchestrationRun> {
        self.repository.try_begin_run(Utc::now()).await
    }

    /// Marks a queued run as running.
    pub async fn start_run(&self, run_id: Uuid) -> AppResult<OrchestrationRun> {
        self.repository.mark_running(run_id).await
    }

    /// Reports current step and progress of a running run.
    pub async fn report_progress(
        &self,
        run_id: Uuid,
        step: NonEmptyString,
        progress: i32,
    ) -> AppResult<()> {
        if progress < 0 {
            return Err(AppError::Validation(
                "progress must be non-negative".to_owned(),
            ));
        }

        self.repository
            .update_progress(run_id, step.as_str(), progress)
            .await
    }

    /// Completes a running run successfully with its final counters.
    pub async fn complete_run(
        &self,
        run_id: Uuid,
        counters: OrchestrationCounters,
    ) -> AppResult<OrchestrationRun> {
        self.repository
            .complete_run(CompleteOrchestrationRunInput {
                run_id,
                status: OrchestrationRunStatus::Completed,
                completed_at: Utc::now(),
                counters,
                error_message: None,
            })
            .await
    }

    /// Fails a running run with an error message.
    pub async fn fail_run(
        &self,
        run_id: Uuid,
        error_message: impl Into<String>,
    ) -> AppResult<OrchestrationRun> {
        self.repository
            .complete_run(CompleteOrchestrationRunInput {
                run_id,
                status: OrchestrationRunStatus::Failed,
                completed_at: Utc::now(),
                counters: OrchestrationCounters::default(),
                error_message: Some(error_message.into()),
            })
            .await
    }

    /// Classifies orchestration health against a staleness threshold.
    ///
    /// An active run is healthy-in-progress; otherwise the most recent
    /// successful completion must be within the threshold of now. A failed
    /// latest run surfaces its error detail on the report.
    pub async fn health(&self, staleness_threshold: Duration) -> AppResult<OrchestrationHealth> {
        if staleness_threshold <= Duration::zero() {
            return Err(AppError::Validation(
                "staleness_threshold must be a positive duration".to_owned(),
            ));
        }

        let latest = self.repository.find_latest_run().await?;
        let last_error = latest
            .as_ref()
            .filter(|run| run.status == OrchestrationRunStatus::Failed)
            .and_then(|run| run.error_message.clone());

        if let Some(run) = &latest
            && run.is_active()
        {
            return Ok(OrchestrationHealth {
                status: OrchestrationHealthStatus::InProgress,
                last_completed_at: self
                    .repository
                    .find_latest_completed_run()
                    .await?
                    .and_then(|completed| completed.completed_at),
                last_error,
            });
        }

        let Some(completed) = self.repository.find_latest_completed_run().await? else {
            return Ok(OrchestrationHealth {
                status: OrchestrationHealthStatus::NeverCompleted,
                last_completed_at: None,
                last_error,
            });
        };

        let Some(completed_at) = completed.completed_at else {
            return Err(AppError::Internal(format!(
                "completed run '{}' is missing its terminal timestamp",
                completed.run_id
            )));
        };

        let status = if Utc::now() - completed_at <= staleness_threshold {
            OrchestrationHealthStatus::Healthy
        } else {
            OrchestrationHealthStatus::Stale
        };

        Ok(OrchestrationHealth {
            status,
            last_completed_at: Some(completed_at),
            last_error,
        })
    }
}
