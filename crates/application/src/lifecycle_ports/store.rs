use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tempora_core::AppResult;
use tempora_domain::ArchiveEntityKind;
use uuid::Uuid;

/// One operational row eligible for archival. The payload is opaque to the
/// lifecycle engine; only the identifier and age timestamp drive decisions.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivableRow {
    /// Stable row identifier, shared between operational and archive stores.
    pub id: Uuid,
    /// Timestamp that determines the row's age.
    pub aged_at: DateTime<Utc>,
    /// Opaque row payload carried into the archive.
    pub payload: Value,
}

/// One archived row: an operational row plus its archival timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedRow {
    /// Source row identifier; the archive deduplicates on it.
    pub id: Uuid,
    /// Age timestamp carried over from the operational row.
    pub aged_at: DateTime<Utc>,
    /// Opaque row payload.
    pub payload: Value,
    /// When the row was copied into the archive.
    pub archived_at: DateTime<Utc>,
}

impl ArchivedRow {
    /// Creates an archive row from an operational row.
    #[must_use]
    pub fn from_archivable(row: ArchivableRow, archived_at: DateTime<Utc>) -> Self {
        Self {
            id: row.id,
            aged_at: row.aged_at,
            payload: row.payload,
            archived_at,
        }
    }
}

/// Store port for operational and archive tables of all entity kinds.
///
/// Implementations must be transactional at the granularity of one call:
/// a batch insert or delete either lands fully or not at all.
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    /// Lists operational rows strictly older than the cutoff, oldest first.
    async fn list_aged(
        &self,
        kind: ArchiveEntityKind,
        cutoff: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<ArchivableRow>>;

    /// Durably writes rows into archive storage, deduplicating by source id.
    async fn insert_archived(&self, kind: ArchiveEntityKind, rows: &[ArchivedRow])
    -> AppResult<()>;

    /// Deletes operational rows by id, returning the deleted count.
    async fn delete_operational(&self, kind: ArchiveEntityKind, ids: &[Uuid]) -> AppResult<u64>;

    /// Permanently deletes archive rows archived strictly before the cutoff.
    async fn purge_archived(&self, kind: ArchiveEntityKind, cutoff: DateTime<Utc>)
    -> AppResult<u64>;
}
