use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use tempora_application::ExecutionHistoryRepository;
use tempora_core::{AppError, AppResult};
use tempora_domain::ExecutionInterval;

/// PostgreSQL-backed read model over job execution intervals.
#[derive(Clone)]
pub struct PostgresExecutionHistoryRepository {
    pool: PgPool,
}

impl PostgresExecutionHistoryRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ExecutionIntervalRow {
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

#[async_trait]
impl ExecutionHistoryRepository for PostgresExecutionHistoryRepository {
    async fn list_intervals(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AppResult<Vec<ExecutionInterval>> {
        let rows = sqlx::query_as::<_, ExecutionIntervalRow>(
            r#"
            SELECT started_at, finished_at
            FROM job_executions
            WHERE started_at < $2
                AND (finished_at IS NULL OR finished_at > $1)
            ORDER BY started_at ASC
            "#,
        )
        .bind(window_start)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list execution intervals: {error}"))
        })?;

        rows.into_iter()
            .map(|row| ExecutionInterval::new(row.started_at, row.finished_at))
            .collect()
    }
}
