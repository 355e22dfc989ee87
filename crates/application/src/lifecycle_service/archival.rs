use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempora_core::{AppError, AppResult};
use tempora_domain::ArchiveEntityKind;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::lifecycle_ports::{ArchivedRow, LifecycleStore};

/// Result of one entity kind's archival pass. A recorded error means the
/// pass stopped early and the count is partial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivalOutcome {
    /// Rows durably copied into the archive across all batches.
    pub archived_rows: u64,
    /// First irrecoverable batch failure, when one occurred.
    pub error: Option<String>,
    /// Whether the pass stopped at a batch boundary due to cancellation.
    pub cancelled: bool,
}

/// Moves aged operational rows into archive storage in bounded batches.
///
/// Each batch is a two-phase copy-then-delete: rows are deleted from the
/// operational store only after the archive write is confirmed durable. A
/// delete failure after a successful copy leaves a duplicate archive row,
/// which the archive tolerates by deduplicating on source id.
pub struct ArchivalBatcher {
    store: Arc<dyn LifecycleStore>,
    batch_size: usize,
}

impl ArchivalBatcher {
    /// Creates a batcher with a positive batch size.
    pub fn new(store: Arc<dyn LifecycleStore>, batch_size: usize) -> AppResult<Self> {
        if batch_size == 0 {
            return Err(AppError::Validation(
                "archival batch_size must be greater than zero".to_owned(),
            ));
        }

        Ok(Self { store, batch_size })
    }

    /// Archives all rows of `kind` strictly older than `cutoff`, oldest
    /// first, stopping early on failure or cancellation.
    pub async fn archive(
        &self,
        kind: ArchiveEntityKind,
        cutoff: DateTime<Utc>,
        cancellation: &CancellationToken,
    ) -> ArchivalOutcome {
        let mut archived_rows: u64 = 0;

        loop {
            if cancellation.is_cancelled() {
                return ArchivalOutcome {
                    archived_rows,
                    error: None,
                    cancelled: true,
                };
            }

            let batch = match self.store.list_aged(kind, cutoff, self.batch_size, 0).await {
                Ok(batch) => batch,
                Err(error) => {
                    return ArchivalOutcome {
                        archived_rows,
                        error: Some(format!("failed to select aged rows: {error}")),
                        cancelled: false,
                    };
                }
            };

            if batch.is_empty() {
                break;
            }

            let batch_len = batch.len();
            let archived_at = Utc::now();
            let rows: Vec<ArchivedRow> = batch
                .iter()
                .cloned()
                .map(|row| ArchivedRow::from_archivable(row, archived_at))
                .collect();

            // Fail-closed: nothing is deleted unless the copy landed.
            if let Err(error) = self.store.insert_archived(kind, &rows).await {
                return ArchivalOutcome {
                    archived_rows,
                    error: Some(format!("failed to copy batch into archive: {error}")),
                    cancelled: false,
                };
            }

            let ids: Vec<_> = batch.iter().map(|row| row.id).collect();
            if let Err(error) = self.store.delete_operational(kind, &ids).await {
                // The copy is durable, so the rows are duplicated rather
                // than lost; the archive deduplicates on source id.
                warn!(
                    kind = kind.as_str(),
                    batch_len,
                    error = %error,
                    "operational delete failed after archive copy"
                );
                return ArchivalOutcome {
                    archived_rows: archived_rows + batch_len as u64,
                    error: Some(format!(
                        "failed to delete archived rows from operational store: {error}"
                    )),
                    cancelled: false,
                };
            }

            archived_rows += batch_len as u64;
            debug!(
                kind = kind.as_str(),
                batch_len, archived_rows, "archived one batch"
            );

            if batch_len < self.batch_size {
                break;
            }
        }

        ArchivalOutcome {
            archived_rows,
            error: None,
            cancelled: false,
        }
    }
}
