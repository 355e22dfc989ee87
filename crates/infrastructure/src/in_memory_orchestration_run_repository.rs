use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use tempora_application::{
    CompleteOrchestrationRunInput, OrchestrationRun, OrchestrationRunRepository,
};
use tempora_core::{AppError, AppResult};
use tempora_domain::{OrchestrationCounters, OrchestrationRunStatus};

/// In-memory orchestration run repository for development and tests.
///
/// The single-flight check and run insertion happen under one lock, so
/// concurrent requests observe the same atomicity as the Postgres guard.
#[derive(Default)]
pub struct InMemoryOrchestrationRunRepository {
    runs: Mutex<Vec<OrchestrationRun>>,
}

impl InMemoryOrchestrationRunRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrchestrationRunRepository for InMemoryOrchestrationRunRepository {
    async fn try_begin_run(&self, requested_at: DateTime<Utc>) -> AppResult<OrchestrationRun> {
        let mut runs = self.runs.lock().await;
        if runs.iter().any(OrchestrationRun::is_active) {
            return Err(AppError::Conflict(
                "an orchestration run is already queued or running".to_owned(),
            ));
        }

        let run = OrchestrationRun {
            run_id: Uuid::new_v4(),
            status: OrchestrationRunStatus::Queued,
            requested_at,
            completed_at: None,
            current_step: None,
            current_progress: None,
            error_message: None,
            counters: OrchestrationCounters::default(),
        };
        runs.push(run.clone());
        Ok(run)
    }

    async fn mark_running(&self, run_id: Uuid) -> AppResult<OrchestrationRun> {
        let mut runs = self.runs.lock().await;
        let run = runs
            .iter_mut()
            .find(|run| run.run_id == run_id)
            .ok_or_else(|| AppError::NotFound(format!("orchestration run '{run_id}'")))?;

        if !run.status.can_transition_to(OrchestrationRunStatus::Running) {
            return Err(AppError::Conflict(format!(
                "orchestration run '{run_id}' cannot start from status '{}'",
                run.status.as_str()
            )));
        }

        run.status = OrchestrationRunStatus::Running;
        Ok(run.clone())
    }

    async fn update_progress(&self, run_id: Uuid, step: &str, progress: i32) -> AppResult<()> {
        let mut runs = self.runs.lock().await;
        let run = runs
            .iter_mut()
            .find(|run| run.run_id == run_id)
            .ok_or_else(|| AppError::NotFound(format!("orchestration run '{run_id}'")))?;

        if run.status != OrchestrationRunStatus::Running {
            return Err(AppError::Conflict(format!(
                "orchestration run '{run_id}' is not running"
            )));
        }

        run.current_step = Some(step.to_owned());
        run.current_progress = Some(progress);
        Ok(())
    }

    async fn complete_run(
        &self,
        input: CompleteOrchestrationRunInput,
    ) -> AppResult<OrchestrationRun> {
        if !input.status.is_terminal() {
            return Err(AppError::Validation(format!(
                "orchestration run completion status must be terminal, got '{}'",
                input.status.as_str()
            )));
        }

        let mut runs = self.runs.lock().await;
        let run = runs
            .iter_mut()
            .find(|run| run.run_id == input.run_id)
            .ok_or_else(|| AppError::NotFound(format!("orchestration run '{}'", input.run_id)))?;

        if !run.status.can_transition_to(input.status) {
            return Err(AppError::Conflict(format!(
                "orchestration run '{}' cannot move from '{}' to '{}'",
                input.run_id,
                run.status.as_str(),
                input.status.as_str()
            )));
        }

        run.status = input.status;
        run.completed_at = Some(input.completed_at);
        run.counters = input.counters;
        run.error_message = input.error_message;
        Ok(run.clone())
    }

    async fn find_latest_run(&self) -> AppResult<Option<OrchestrationRun>> {
        let runs = self.runs.lock().await;
        Ok(runs.iter().max_by_key(|run| run.requested_at).cloned())
    }

    async fn find_latest_completed_run(&self) -> AppResult<Option<OrchestrationRun>> {
        let runs = self.runs.lock().await;
        Ok(runs
            .iter()
            .filter(|run| run.status == OrchestrationRunStatus::Completed)
            .max_by_key(|run| run.requested_at)
            .cloned())
    }
}
