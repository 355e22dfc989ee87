use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::{Mutex, Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tempora_core::{AppError, AppResult};
use tempora_domain::{ArchiveEntityKind, RetentionPolicy, RetentionPolicyInput};

use crate::lifecycle_ports::{
    ArchivableRow, ArchivedRow, LifecycleStore, LogFileEntry, LogFileStore, RetentionPolicySource,
};
use crate::lifecycle_service::ArchivalBatcher;

use super::MaintenanceService;

#[derive(Default)]
struct FakeLifecycleStore {
    operational: Mutex<HashMap<ArchiveEntityKind, Vec<ArchivableRow>>>,
    archived: Mutex<HashMap<ArchiveEntityKind, HashMap<Uuid, ArchivedRow>>>,
    fail_insert_for: Mutex<HashSet<ArchiveEntityKind>>,
    fail_delete_for: Mutex<HashSet<ArchiveEntityKind>>,
    fail_purge_for: Mutex<HashSet<ArchiveEntityKind>>,
    list_gate: Option<Arc<ListGate>>,
}

/// Blocks `list_aged` calls until the test hands out permits, and signals
/// when the first gated call has been reached.
struct ListGate {
    entered: Notify,
    permits: Semaphore,
}

impl FakeLifecycleStore {
    async fn seed(&self, kind: ArchiveEntityKind, rows: Vec<ArchivableRow>) {
        self.operational.lock().await.insert(kind, rows);
    }

    async fn seed_archive(&self, kind: ArchiveEntityKind, rows: Vec<ArchivedRow>) {
        self.archived
            .lock()
            .await
            .insert(kind, rows.into_iter().map(|row| (row.id, row)).collect());
    }

    async fn operational_count(&self, kind: ArchiveEntityKind) -> usize {
        self.operational
            .lock()
            .await
            .get(&kind)
            .map_or(0, Vec::len)
    }

    async fn archived_count(&self, kind: ArchiveEntityKind) -> usize {
        self.archived.lock().await.get(&kind).map_or(0, HashMap::len)
    }

    async fn archived_rows(&self, kind: ArchiveEntityKind) -> Vec<ArchivedRow> {
        self.archived
            .lock()
            .await
            .get(&kind)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LifecycleStore for FakeLifecycleStore {
    async fn list_aged(
        &self,
        kind: ArchiveEntityKind,
        cutoff: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<ArchivableRow>> {
        if let Some(gate) = &self.list_gate {
            gate.entered.notify_one();
            if let Ok(permit) = gate.permits.acquire().await {
                permit.forget();
            }
        }

        let mut rows: Vec<ArchivableRow> = self
            .operational
            .lock()
            .await
            .get(&kind)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.aged_at < cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|row| row.aged_at);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert_archived(
        &self,
        kind: ArchiveEntityKind,
        rows: &[ArchivedRow],
    ) -> AppResult<()> {
        if self.fail_insert_for.lock().await.contains(&kind) {
            return Err(AppError::Internal("archive storage unavailable".to_owned()));
        }

        let mut archived = self.archived.lock().await;
        let entries = archived.entry(kind).or_default();
        for row in rows {
            entries.entry(row.id).or_insert_with(|| row.clone());
        }
        Ok(())
    }

    async fn delete_operational(&self, kind: ArchiveEntityKind, ids: &[Uuid]) -> AppResult<u64> {
        if self.fail_delete_for.lock().await.contains(&kind) {
            return Err(AppError::Internal(
                "operational store rejected delete".to_owned(),
            ));
        }

        let id_set: HashSet<Uuid> = ids.iter().copied().collect();
        let mut operational = self.operational.lock().await;
        let rows = operational.entry(kind).or_default();
        let before = rows.len();
        rows.retain(|row| !id_set.contains(&row.id));
        Ok((before - rows.len()) as u64)
    }

    async fn purge_archived(
        &self,
        kind: ArchiveEntityKind,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        if self.fail_purge_for.lock().await.contains(&kind) {
            return Err(AppError::Internal("archive storage unavailable".to_owned()));
        }

        let mut archived = self.archived.lock().await;
        let entries = archived.entry(kind).or_default();
        let before = entries.len();
        entries.retain(|_, row| row.archived_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Default)]
struct FakeLogFileStore {
    files: Mutex<Vec<LogFileEntry>>,
    fail_paths: Mutex<HashSet<PathBuf>>,
}

#[async_trait]
impl LogFileStore for FakeLogFileStore {
    async fn list_files(&self, _directory: &Path) -> AppResult<Vec<LogFileEntry>> {
        Ok(self.files.lock().await.clone())
    }

    async fn delete_file(&self, path: &Path) -> AppResult<()> {
        if self.fail_paths.lock().await.contains(path) {
            return Err(AppError::Internal("permission denied".to_owned()));
        }

        self.files.lock().await.retain(|entry| entry.path != path);
        Ok(())
    }
}

struct FakePolicySource {
    policy: RetentionPolicy,
    loads: AtomicUsize,
}

impl FakePolicySource {
    fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy,
            loads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RetentionPolicySource for FakePolicySource {
    async fn load(&self) -> AppResult<RetentionPolicy> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.policy)
    }
}

fn policy(batch_size: usize, archival_enabled: bool) -> RetentionPolicy {
    RetentionPolicy::new(RetentionPolicyInput {
        job_retention: Duration::days(30),
        job_execution_retention: Duration::days(30),
        audit_log_retention: Duration::days(30),
        schedule_execution_retention: Duration::days(30),
        archive_retention: Duration::days(365),
        log_retention: Duration::days(7),
        batch_size,
        archival_enabled,
    })
    .unwrap_or_else(|_| unreachable!())
}

fn aged_row(days_old: i64) -> ArchivableRow {
    ArchivableRow {
        id: Uuid::new_v4(),
        aged_at: Utc::now() - Duration::days(days_old),
        payload: json!({"source": "test"}),
    }
}

fn row_at(aged_at: DateTime<Utc>) -> ArchivableRow {
    ArchivableRow {
        id: Uuid::new_v4(),
        aged_at,
        payload: json!({"source": "test"}),
    }
}

fn service(
    policy_source: Arc<FakePolicySource>,
    store: Arc<FakeLifecycleStore>,
    log_store: Arc<FakeLogFileStore>,
) -> MaintenanceService {
    MaintenanceService::new(
        policy_source,
        store,
        log_store,
        PathBuf::from("/var/log/tempora"),
    )
}

#[tokio::test]
async fn batcher_rejects_zero_batch_size() {
    let store = Arc::new(FakeLifecycleStore::default());
    assert!(ArchivalBatcher::new(store, 0).is_err());
}

#[tokio::test]
async fn archives_only_rows_strictly_older_than_cutoff() {
    let store = Arc::new(FakeLifecycleStore::default());
    let cutoff = Utc::now() - Duration::days(30);
    store
        .seed(
            ArchiveEntityKind::Job,
            vec![
                row_at(cutoff - Duration::days(1)),
                row_at(cutoff),
                row_at(cutoff + Duration::days(1)),
            ],
        )
        .await;

    let batcher =
        ArchivalBatcher::new(store.clone(), 100).unwrap_or_else(|_| unreachable!());
    let outcome = batcher
        .archive(ArchiveEntityKind::Job, cutoff, &CancellationToken::new())
        .await;

    assert_eq!(outcome.archived_rows, 1);
    assert!(outcome.error.is_none());
    // The row exactly at the cutoff stays operational.
    assert_eq!(store.operational_count(ArchiveEntityKind::Job).await, 2);
    assert_eq!(store.archived_count(ArchiveEntityKind::Job).await, 1);
}

#[tokio::test]
async fn archival_processes_multiple_batches_oldest_first() {
    let store = Arc::new(FakeLifecycleStore::default());
    store
        .seed(
            ArchiveEntityKind::AuditLog,
            vec![
                aged_row(90),
                aged_row(80),
                aged_row(70),
                aged_row(60),
                aged_row(50),
            ],
        )
        .await;

    let batcher = ArchivalBatcher::new(store.clone(), 2).unwrap_or_else(|_| unreachable!());
    let outcome = batcher
        .archive(
            ArchiveEntityKind::AuditLog,
            Utc::now() - Duration::days(30),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.archived_rows, 5);
    assert!(outcome.error.is_none());
    assert_eq!(store.operational_count(ArchiveEntityKind::AuditLog).await, 0);
    assert_eq!(store.archived_count(ArchiveEntityKind::AuditLog).await, 5);
}

#[tokio::test]
async fn copy_failure_is_fail_closed() {
    let store = Arc::new(FakeLifecycleStore::default());
    store
        .seed(ArchiveEntityKind::Job, vec![aged_row(90), aged_row(80)])
        .await;
    store
        .fail_insert_for
        .lock()
        .await
        .insert(ArchiveEntityKind::Job);

    let batcher = ArchivalBatcher::new(store.clone(), 10).unwrap_or_else(|_| unreachable!());
    let outcome = batcher
        .archive(
            ArchiveEntityKind::Job,
            Utc::now() - Duration::days(30),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.archived_rows, 0);
    assert!(outcome.error.is_some());
    // No operational rows are touched when the copy never landed.
    assert_eq!(store.operational_count(ArchiveEntityKind::Job).await, 2);
    assert_eq!(store.archived_count(ArchiveEntityKind::Job).await, 0);
}

#[tokio::test]
async fn delete_failure_duplicates_but_never_loses_rows() {
    let store = Arc::new(FakeLifecycleStore::default());
    store
        .seed(ArchiveEntityKind::JobExecution, vec![aged_row(90)])
        .await;
    store
        .fail_delete_for
        .lock()
        .await
        .insert(ArchiveEntityKind::JobExecution);

    let batcher = ArchivalBatcher::new(store.clone(), 10).unwrap_or_else(|_| unreachable!());
    let cutoff = Utc::now() - Duration::days(30);
    let outcome = batcher
        .archive(
            ArchiveEntityKind::JobExecution,
            cutoff,
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(outcome.archived_rows, 1);
    assert!(outcome.error.is_some());
    // The row now exists on both sides; duplicated, not lost.
    assert_eq!(
        store.operational_count(ArchiveEntityKind::JobExecution).await,
        1
    );
    assert_eq!(
        store.archived_count(ArchiveEntityKind::JobExecution).await,
        1
    );

    // A later run with the delete failure cleared converges: the archive
    // deduplicates on source id and the operational copy goes away.
    store.fail_delete_for.lock().await.clear();
    let outcome = batcher
        .archive(
            ArchiveEntityKind::JobExecution,
            cutoff,
            &CancellationToken::new(),
        )
        .await;
    assert!(outcome.error.is_none());
    assert_eq!(
        store.operational_count(ArchiveEntityKind::JobExecution).await,
        0
    );
    assert_eq!(
        store.archived_count(ArchiveEntityKind::JobExecution).await,
        1
    );
}

#[tokio::test]
async fn maintenance_is_idempotent_on_immediate_rerun() {
    let store = Arc::new(FakeLifecycleStore::default());
    for kind in ArchiveEntityKind::ALL {
        store.seed(kind, vec![aged_row(90), aged_row(10)]).await;
    }
    let policy_source = Arc::new(FakePolicySource::new(policy(100, true)));
    let service = service(
        policy_source.clone(),
        store.clone(),
        Arc::new(FakeLogFileStore::default()),
    );

    let first = service
        .run_maintenance(&CancellationToken::new())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(first.success);
    assert_eq!(first.archived_total(), 4);

    let second = service
        .run_maintenance(&CancellationToken::new())
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(second.success);
    assert_eq!(second.archived_total(), 0);

    // The policy is re-read at the start of every run.
    assert_eq!(policy_source.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn one_kind_failing_does_not_block_the_others() {
    let store = Arc::new(FakeLifecycleStore::default());
    store
        .seed(ArchiveEntityKind::AuditLog, vec![aged_row(90)])
        .await;
    store
        .seed(ArchiveEntityKind::JobExecution, vec![aged_row(90)])
        .await;
    store
        .fail_insert_for
        .lock()
        .await
        .insert(ArchiveEntityKind::AuditLog);

    let service = service(
        Arc::new(FakePolicySource::new(policy(100, true))),
        store.clone(),
        Arc::new(FakeLogFileStore::default()),
    );

    let result = service
        .run_maintenance(&CancellationToken::new())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(!result.success);
    assert!(result.error_message.is_some());
    assert_eq!(result.archived_for(ArchiveEntityKind::AuditLog), Some(0));
    assert_eq!(
        result.archived_for(ArchiveEntityKind::JobExecution),
        Some(1)
    );
    assert_eq!(
        store.archived_count(ArchiveEntityKind::JobExecution).await,
        1
    );
}

#[tokio::test]
async fn purge_only_deletes_rows_past_archive_retention() {
    let store = Arc::new(FakeLifecycleStore::default());
    let now = Utc::now();
    // Ages straddling the 365-day archive retention from both sides.
    for age_days in [1_i64, 100, 200, 364, 366, 500, 1000] {
        let row = aged_row(age_days + 30);
        store
            .seed_archive(
                ArchiveEntityKind::Job,
                vec![ArchivedRow {
                    id: row.id,
                    aged_at: row.aged_at,
                    payload: row.payload,
                    archived_at: now - Duration::days(age_days),
                }],
            )
            .await;

        let service = service(
            Arc::new(FakePolicySource::new(policy(100, true))),
            store.clone(),
            Arc::new(FakeLogFileStore::default()),
        );
        let result = service
            .run_maintenance(&CancellationToken::new())
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(result.success);

        let survivors = store.archived_rows(ArchiveEntityKind::Job).await;
        let cutoff = now - Duration::days(365);
        assert_eq!(survivors.is_empty(), age_days > 365);
        for survivor in survivors {
            assert!(survivor.archived_at >= cutoff);
        }
    }
}

#[tokio::test]
async fn disabled_archival_still_reaps_log_files() {
    let store = Arc::new(FakeLifecycleStore::default());
    store
        .seed(ArchiveEntityKind::Job, vec![aged_row(90)])
        .await;
    let log_store = Arc::new(FakeLogFileStore::default());
    log_store.files.lock().await.push(LogFileEntry {
        path: PathBuf::from("/var/log/tempora/old.log"),
        modified_at: Utc::now() - Duration::days(30),
    });

    let service = service(
        Arc::new(FakePolicySource::new(policy(100, false))),
        store.clone(),
        log_store.clone(),
    );

    let result = service
        .run_maintenance(&CancellationToken::new())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.success);
    assert!(result.archived.is_empty());
    assert!(result.purged.is_empty());
    assert_eq!(result.reaped_log_files, 1);
    assert_eq!(store.operational_count(ArchiveEntityKind::Job).await, 1);
    assert!(log_store.files.lock().await.is_empty());
}

#[tokio::test]
async fn log_reaping_skips_files_that_fail_to_delete() {
    let log_store = Arc::new(FakeLogFileStore::default());
    let stuck = PathBuf::from("/var/log/tempora/stuck.log");
    {
        let mut files = log_store.files.lock().await;
        files.push(LogFileEntry {
            path: stuck.clone(),
            modified_at: Utc::now() - Duration::days(30),
        });
        files.push(LogFileEntry {
            path: PathBuf::from("/var/log/tempora/old.log"),
            modified_at: Utc::now() - Duration::days(30),
        });
        files.push(LogFileEntry {
            path: PathBuf::from("/var/log/tempora/fresh.log"),
            modified_at: Utc::now(),
        });
    }
    log_store.fail_paths.lock().await.insert(stuck);

    let service = service(
        Arc::new(FakePolicySource::new(policy(100, true))),
        Arc::new(FakeLifecycleStore::default()),
        log_store.clone(),
    );

    let result = service
        .run_maintenance(&CancellationToken::new())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.success);
    assert_eq!(result.reaped_log_files, 1);
    assert_eq!(log_store.files.lock().await.len(), 2);
}

#[tokio::test]
async fn cancelled_run_returns_partial_result() {
    let store = Arc::new(FakeLifecycleStore::default());
    store
        .seed(ArchiveEntityKind::Job, vec![aged_row(90)])
        .await;

    let service = service(
        Arc::new(FakePolicySource::new(policy(100, true))),
        store.clone(),
        Arc::new(FakeLogFileStore::default()),
    );

    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let result = service
        .run_maintenance(&cancellation)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.cancelled);
    assert!(result.success);
    assert_eq!(result.archived_total(), 0);
    assert_eq!(result.reaped_log_files, 0);
    assert_eq!(store.operational_count(ArchiveEntityKind::Job).await, 1);
}

#[tokio::test]
async fn overlapping_invocation_is_rejected() {
    let gate = Arc::new(ListGate {
        entered: Notify::new(),
        permits: Semaphore::new(0),
    });
    let store = Arc::new(FakeLifecycleStore {
        list_gate: Some(gate.clone()),
        ..FakeLifecycleStore::default()
    });
    store
        .seed(ArchiveEntityKind::Job, vec![aged_row(90)])
        .await;

    let service = service(
        Arc::new(FakePolicySource::new(policy(100, true))),
        store,
        Arc::new(FakeLogFileStore::default()),
    );

    let first = {
        let service = service.clone();
        tokio::spawn(async move { service.run_maintenance(&CancellationToken::new()).await })
    };

    // Wait until the first run holds the single-flight guard.
    gate.entered.notified().await;

    let second = service.run_maintenance(&CancellationToken::new()).await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    gate.permits.add_permits(64);
    let first = first.await.unwrap_or_else(|_| unreachable!());
    assert!(first.is_ok());
}
