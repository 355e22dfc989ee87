use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempora_core::AppResult;
use tempora_domain::ArchiveEntityKind;
use tracing::debug;

use crate::lifecycle_ports::LifecycleStore;

/// Permanently deletes archive rows past the long-horizon retention.
///
/// There is no further archival tier; purged rows are gone. Safety against
/// purging freshly archived rows comes from the policy invariant that
/// archive retention strictly exceeds every operational retention.
pub struct ArchivePurger {
    store: Arc<dyn LifecycleStore>,
}

impl ArchivePurger {
    /// Creates a purger over the lifecycle store.
    #[must_use]
    pub fn new(store: Arc<dyn LifecycleStore>) -> Self {
        Self { store }
    }

    /// Deletes archive rows of `kind` archived strictly before `cutoff`,
    /// returning the purged count.
    pub async fn purge(&self, kind: ArchiveEntityKind, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let purged = self.store.purge_archived(kind, cutoff).await?;
        debug!(kind = kind.as_str(), purged, "purged archive rows");
        Ok(purged)
    }
}
