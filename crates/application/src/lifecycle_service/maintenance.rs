use chrono::{DateTime, Utc};
use serde::Serialize;
use tempora_core::{AppError, AppResult};
use tempora_domain::ArchiveEntityKind;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::archival::ArchivalBatcher;
use super::purge::ArchivePurger;
use super::reaper::LogFileReaper;
use super::MaintenanceService;

/// Archived or purged row count for one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntityKindCount {
    /// Entity kind the count belongs to.
    pub kind: ArchiveEntityKind,
    /// Affected row count.
    pub count: u64,
}

/// Aggregate report of one maintenance run. Counts cover only the steps
/// that ran; a cancelled run reports what completed before the stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceResult {
    /// Rows archived per entity kind.
    pub archived: Vec<EntityKindCount>,
    /// Archive rows purged per entity kind.
    pub purged: Vec<EntityKindCount>,
    /// Log files deleted from disk.
    pub reaped_log_files: u64,
    /// Whether every executed step succeeded.
    pub success: bool,
    /// Joined step failure messages, when any step failed.
    pub error_message: Option<String>,
    /// Whether the run stopped early at a cancellation boundary.
    pub cancelled: bool,
    /// Run start timestamp.
    pub started_at: DateTime<Utc>,
    /// Run finish timestamp.
    pub finished_at: DateTime<Utc>,
}

impl MaintenanceResult {
    /// Returns total rows archived across entity kinds.
    #[must_use]
    pub fn archived_total(&self) -> u64 {
        self.archived.iter().map(|entry| entry.count).sum()
    }

    /// Returns total archive rows purged across entity kinds.
    #[must_use]
    pub fn purged_total(&self) -> u64 {
        self.purged.iter().map(|entry| entry.count).sum()
    }

    /// Returns the archived count for one entity kind, when that kind ran.
    #[must_use]
    pub fn archived_for(&self, kind: ArchiveEntityKind) -> Option<u64> {
        self.archived
            .iter()
            .find(|entry| entry.kind == kind)
            .map(|entry| entry.count)
    }
}

impl MaintenanceService {
    /// Runs one full maintenance pass and returns its aggregate report.
    ///
    /// The retention policy is re-read at the start of every run. Invalid
    /// configuration and an already-running pass are rejected before any
    /// work starts; once work starts, step failures are aggregated into
    /// the report instead of propagating.
    pub async fn run_maintenance(
        &self,
        cancellation: &CancellationToken,
    ) -> AppResult<MaintenanceResult> {
        let Ok(_guard) = self.run_guard.try_lock() else {
            return Err(AppError::Conflict(
                "a maintenance run is already in progress".to_owned(),
            ));
        };

        let policy = self.policy_source.load().await?;
        let started_at = Utc::now();
        let now = started_at;

        let mut archived = Vec::new();
        let mut purged = Vec::new();
        let mut reaped_log_files = 0;
        let mut errors: Vec<String> = Vec::new();
        let mut cancelled = false;

        info!(
            archival_enabled = policy.archival_enabled(),
            batch_size = policy.batch_size(),
            "maintenance run started"
        );

        if policy.archival_enabled() {
            let batcher = ArchivalBatcher::new(self.store.clone(), policy.batch_size())?;
            for kind in ArchiveEntityKind::ALL {
                if cancellation.is_cancelled() {
                    cancelled = true;
                    break;
                }

                let cutoff = policy.operational_cutoff(kind, now);
                let outcome = batcher.archive(kind, cutoff, cancellation).await;
                archived.push(EntityKindCount {
                    kind,
                    count: outcome.archived_rows,
                });
                if let Some(error) = outcome.error {
                    warn!(kind = kind.as_str(), error = %error, "archival step failed");
                    errors.push(format!("archive {}: {error}", kind.as_str()));
                }
                if outcome.cancelled {
                    cancelled = true;
                    break;
                }
            }

            if !cancelled {
                let purger = ArchivePurger::new(self.store.clone());
                let archive_cutoff = policy.archive_cutoff(now);
                for kind in ArchiveEntityKind::ALL {
                    if cancellation.is_cancelled() {
                        cancelled = true;
                        break;
                    }

                    match purger.purge(kind, archive_cutoff).await {
                        Ok(count) => purged.push(EntityKindCount { kind, count }),
                        Err(error) => {
                            warn!(kind = kind.as_str(), error = %error, "purge step failed");
                            purged.push(EntityKindCount { kind, count: 0 });
                            errors.push(format!("purge {}: {error}", kind.as_str()));
                        }
                    }
                }
            }
        }

        if cancellation.is_cancelled() {
            cancelled = true;
        }

        if !cancelled {
            let reaper = LogFileReaper::new(self.log_store.clone());
            match reaper
                .reap(self.log_directory.as_path(), policy.log_cutoff(now))
                .await
            {
                Ok(deleted) => reaped_log_files = deleted,
                Err(error) => {
                    warn!(error = %error, "log reaping step failed");
                    errors.push(format!("reap logs: {error}"));
                }
            }
        }

        let success = errors.is_empty();
        let error_message = if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        };

        let result = MaintenanceResult {
            archived,
            purged,
            reaped_log_files,
            success,
            error_message,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            archived_total = result.archived_total(),
            purged_total = result.purged_total(),
            reaped_log_files = result.reaped_log_files,
            success = result.success,
            cancelled = result.cancelled,
            "maintenance run finished"
        );

        Ok(result)
    }
}
