use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use tempora_application::{ArchivableRow, ArchivedRow, LifecycleStore};
use tempora_core::{AppError, AppResult};
use tempora_domain::ArchiveEntityKind;

/// Operational and archive table names for one entity kind.
struct EntityTables {
    operational: &'static str,
    age_column: &'static str,
    archive: &'static str,
}

fn entity_tables(kind: ArchiveEntityKind) -> EntityTables {
    match kind {
        ArchiveEntityKind::Job => EntityTables {
            operational: "scheduled_jobs",
            age_column: "updated_at",
            archive: "archived_scheduled_jobs",
        },
        ArchiveEntityKind::JobExecution => EntityTables {
            operational: "job_executions",
            age_column: "started_at",
            archive: "archived_job_executions",
        },
        ArchiveEntityKind::AuditLog => EntityTables {
            operational: "audit_log_entries",
            age_column: "created_at",
            archive: "archived_audit_log_entries",
        },
        ArchiveEntityKind::ScheduleExecution => EntityTables {
            operational: "schedule_executions",
            age_column: "started_at",
            archive: "archived_schedule_executions",
        },
    }
}

/// PostgreSQL-backed lifecycle store over the operational and archive
/// tables of all entity kinds. Every call is one statement, so batches are
/// transactional at the granularity the archival protocol requires.
#[derive(Clone)]
pub struct PostgresLifecycleStore {
    pool: PgPool,
}

impl PostgresLifecycleStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ArchivableRowRecord {
    id: Uuid,
    aged_at: DateTime<Utc>,
    payload: Value,
}

#[async_trait]
impl LifecycleStore for PostgresLifecycleStore {
    async fn list_aged(
        &self,
        kind: ArchiveEntityKind,
        cutoff: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<ArchivableRow>> {
        let tables = entity_tables(kind);
        let query = format!(
            r#"
            SELECT id, {age} AS aged_at, payload
            FROM {operational}
            WHERE {age} < $1
            ORDER BY {age} ASC
            LIMIT $2
            OFFSET $3
            "#,
            age = tables.age_column,
            operational = tables.operational,
        );

        let rows = sqlx::query_as::<_, ArchivableRowRecord>(query.as_str())
            .bind(cutoff)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to list aged rows from '{}': {error}",
                    tables.operational
                ))
            })?;

        Ok(rows
            .into_iter()
            .map(|row| ArchivableRow {
                id: row.id,
                aged_at: row.aged_at,
                payload: row.payload,
            })
            .collect())
    }

    async fn insert_archived(
        &self,
        kind: ArchiveEntityKind,
        rows: &[ArchivedRow],
    ) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let tables = entity_tables(kind);
        let query = format!(
            r#"
            INSERT INTO {archive} (id, aged_at, payload, archived_at)
            SELECT * FROM UNNEST($1::uuid[], $2::timestamptz[], $3::jsonb[], $4::timestamptz[])
            ON CONFLICT (id) DO NOTHING
            "#,
            archive = tables.archive,
        );

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let aged_at: Vec<DateTime<Utc>> = rows.iter().map(|row| row.aged_at).collect();
        let payloads: Vec<Value> = rows.iter().map(|row| row.payload.clone()).collect();
        let archived_at: Vec<DateTime<Utc>> = rows.iter().map(|row| row.archived_at).collect();

        sqlx::query(query.as_str())
            .bind(ids)
            .bind(aged_at)
            .bind(payloads)
            .bind(archived_at)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to insert archive rows into '{}': {error}",
                    tables.archive
                ))
            })?;

        Ok(())
    }

    async fn delete_operational(&self, kind: ArchiveEntityKind, ids: &[Uuid]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let tables = entity_tables(kind);
        let query = format!(
            "DELETE FROM {operational} WHERE id = ANY($1)",
            operational = tables.operational,
        );

        let result = sqlx::query(query.as_str())
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to delete archived rows from '{}': {error}",
                    tables.operational
                ))
            })?;

        Ok(result.rows_affected())
    }

    async fn purge_archived(
        &self,
        kind: ArchiveEntityKind,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        let tables = entity_tables(kind);
        let query = format!(
            "DELETE FROM {archive} WHERE archived_at < $1",
            archive = tables.archive,
        );

        let result = sqlx::query(query.as_str())
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to purge archive rows from '{}': {error}",
                    tables.archive
                ))
            })?;

        Ok(result.rows_affected())
    }
}
