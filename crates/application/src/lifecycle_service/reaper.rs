use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempora_core::AppResult;
use tracing::warn;

use crate::lifecycle_ports::LogFileStore;

/// Removes on-disk log files older than the configured cutoff.
pub struct LogFileReaper {
    log_store: Arc<dyn LogFileStore>,
}

impl LogFileReaper {
    /// Creates a reaper over the log file store.
    #[must_use]
    pub fn new(log_store: Arc<dyn LogFileStore>) -> Self {
        Self { log_store }
    }

    /// Deletes files in `directory` last modified strictly before `cutoff`,
    /// returning the deleted count. A missing directory reaps zero files;
    /// individual delete failures are logged and skipped.
    pub async fn reap(&self, directory: &Path, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let entries = self.log_store.list_files(directory).await?;

        let mut deleted: u64 = 0;
        for entry in entries {
            if entry.modified_at >= cutoff {
                continue;
            }

            match self.log_store.delete_file(entry.path.as_path()).await {
                Ok(()) => deleted += 1,
                Err(error) => {
                    warn!(
                        path = %entry.path.display(),
                        error = %error,
                        "failed to delete aged log file"
                    );
                }
            }
        }

        Ok(deleted)
    }
}
