use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use tempora_application::{
    CompleteOrchestrationRunInput, OrchestrationRun, OrchestrationRunRepository,
};
use tempora_core::{AppError, AppResult};
use tempora_domain::{OrchestrationCounters, OrchestrationRunStatus};

/// PostgreSQL-backed orchestration run repository.
///
/// The single-flight guard is a partial unique index over active statuses,
/// so at most one queued or running row can exist even across process
/// restarts and concurrent writers.
#[derive(Clone)]
pub struct PostgresOrchestrationRunRepository {
    pool: PgPool,
}

impl PostgresOrchestrationRunRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct OrchestrationRunRow {
    id: Uuid,
    status: String,
    requested_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    current_step: Option<String>,
    current_progress: Option<i32>,
    error_message: Option<String>,
    accounts_synced: i64,
    jobs_created: i64,
    jobs_updated: i64,
    jobs_removed: i64,
}

fn run_from_row(row: OrchestrationRunRow) -> AppResult<OrchestrationRun> {
    Ok(OrchestrationRun {
        run_id: row.id,
        status: OrchestrationRunStatus::parse(row.status.as_str())?,
        requested_at: row.requested_at,
        completed_at: row.completed_at,
        current_step: row.current_step,
        current_progress: row.current_progress,
        error_message: row.error_message,
        counters: OrchestrationCounters {
            accounts_synced: row.accounts_synced,
            jobs_created: row.jobs_created,
            jobs_updated: row.jobs_updated,
            jobs_removed: row.jobs_removed,
        },
    })
}

const RUN_COLUMNS: &str = r#"
    id,
    status,
    requested_at,
    completed_at,
    current_step,
    current_progress,
    error_message,
    accounts_synced,
    jobs_created,
    jobs_updated,
    jobs_removed
"#;

#[async_trait]
impl OrchestrationRunRepository for PostgresOrchestrationRunRepository {
    async fn try_begin_run(&self, requested_at: DateTime<Utc>) -> AppResult<OrchestrationRun> {
        let query = format!(
            r#"
            INSERT INTO orchestration_runs (id, status, requested_at)
            VALUES ($1, 'queued', $2)
            RETURNING {RUN_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, OrchestrationRunRow>(query.as_str())
            .bind(Uuid::new_v4())
            .bind(requested_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| match &error {
                sqlx::Error::Database(database_error)
                    if database_error.is_unique_violation() =>
                {
                    AppError::Conflict(
                        "an orchestration run is already queued or running".to_owned(),
                    )
                }
                _ => AppError::Internal(format!("failed to create orchestration run: {error}")),
            })?;

        run_from_row(row)
    }

    async fn mark_running(&self, run_id: Uuid) -> AppResult<OrchestrationRun> {
        let query = format!(
            r#"
            UPDATE orchestration_runs
            SET status = 'running'
            WHERE id = $1 AND status = 'queued'
            RETURNING {RUN_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, OrchestrationRunRow>(query.as_str())
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to mark orchestration run '{run_id}' running: {error}"
                ))
            })?;

        match row {
            Some(row) => run_from_row(row),
            None => Err(AppError::Conflict(format!(
                "orchestration run '{run_id}' is not queued"
            ))),
        }
    }

    async fn update_progress(&self, run_id: Uuid, step: &str, progress: i32) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orchestration_runs
            SET current_step = $2, current_progress = $3
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(run_id)
        .bind(step)
        .bind(progress)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to update progress of orchestration run '{run_id}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "orchestration run '{run_id}' is not running"
            )));
        }

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

        let query = format!(
            r#"
            UPDATE orchestration_runs
            SET
                status = $2,
                completed_at = $3,
                error_message = $4,
                accounts_synced = $5,
                jobs_created = $6,
                jobs_updated = $7,
                jobs_removed = $8
            WHERE id = $1 AND status = 'running'
            RETURNING {RUN_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, OrchestrationRunRow>(query.as_str())
            .bind(input.run_id)
            .bind(input.status.as_str())
            .bind(input.completed_at)
            .bind(input.error_message)
            .bind(input.counters.accounts_synced)
            .bind(input.counters.jobs_created)
            .bind(input.counters.jobs_updated)
            .bind(input.counters.jobs_removed)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to complete orchestration run '{}': {error}",
                    input.run_id
                ))
            })?;

        match row {
            Some(row) => run_from_row(row),
            None => Err(AppError::Conflict(format!(
                "orchestration run '{}' is not running",
                input.run_id
            ))),
        }
    }

    async fn find_latest_run(&self) -> AppResult<Option<OrchestrationRun>> {
        let query = format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM orchestration_runs
            ORDER BY requested_at DESC
            LIMIT 1
            "#
        );

        let row = sqlx::query_as::<_, OrchestrationRunRow>(query.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to find latest orchestration run: {error}"))
            })?;

        row.map(run_from_row).transpose()
    }

    async fn find_latest_completed_run(&self) -> AppResult<Option<OrchestrationRun>> {
        let query = format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM orchestration_runs
            WHERE status = 'completed'
            ORDER BY completed_at DESC
            LIMIT 1
            "#
        );

        let row = sqlx::query_as::<_, OrchestrationRunRow>(query.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to find latest completed orchestration run: {error}"
                ))
            })?;

        row.map(run_from_row).transpose()
    }
}
