use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tempora_application::{LogFileEntry, LogFileStore};
use tempora_core::{AppError, AppResult};

/// Filesystem-backed log file store using last-modified timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLogFileStore;

impl FsLogFileStore {
    /// Creates a filesystem log file store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LogFileStore for FsLogFileStore {
    async fn list_files(&self, directory: &Path) -> AppResult<Vec<LogFileEntry>> {
        let mut read_dir = match tokio::fs::read_dir(directory).await {
            Ok(read_dir) => read_dir,
            // A log directory that does not exist simply has nothing to reap.
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(AppError::Internal(format!(
                    "failed to read log directory '{}': {error}",
                    directory.display()
                )));
            }
        };

        let mut entries = Vec::new();
        loop {
            let entry = read_dir.next_entry().await.map_err(|error| {
                AppError::Internal(format!(
                    "failed to read log directory entry in '{}': {error}",
                    directory.display()
                ))
            })?;
            let Some(entry) = entry else {
                break;
            };

            let metadata = entry.metadata().await.map_err(|error| {
                AppError::Internal(format!(
                    "failed to read metadata of '{}': {error}",
                    entry.path().display()
                ))
            })?;

            if !metadata.is_file() {
                continue;
            }

            let modified = metadata.modified().map_err(|error| {
                AppError::Internal(format!(
                    "failed to read modified time of '{}': {error}",
                    entry.path().display()
                ))
            })?;

            entries.push(LogFileEntry {
                path: entry.path(),
                modified_at: DateTime::<Utc>::from(modified),
            });
        }

        Ok(entries)
    }

    async fn delete_file(&self, path: &Path) -> AppResult<()> {
        tokio::fs::remove_file(path).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to delete log file '{}': {error}",
                path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::FsLogFileStore;
    use tempora_application::{LogFileReaper, LogFileStore};

    #[tokio::test]
    async fn missing_directory_lists_no_files() {
        let store = FsLogFileStore::new();
        let entries = store
            .list_files(Path::new("/nonexistent/tempora-logs"))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn reaper_deletes_only_aged_files() {
        let directory = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let aged = directory.path().join("aged.log");
        let fresh = directory.path().join("fresh.log");
        std::fs::write(&aged, b"old").unwrap_or_else(|_| unreachable!());
        std::fs::write(&fresh, b"new").unwrap_or_else(|_| unreachable!());

        // Both files were just written, so a future cutoff reaps them and a
        // past cutoff reaps nothing.
        let reaper = LogFileReaper::new(Arc::new(FsLogFileStore::new()));

        let deleted = reaper
            .reap(directory.path(), Utc::now() - Duration::hours(1))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(deleted, 0);
        assert!(aged.exists());

        let deleted = reaper
            .reap(directory.path(), Utc::now() + Duration::hours(1))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(deleted, 2);
        assert!(!aged.exists());
        assert!(!fresh.exists());
    }

    #[tokio::test]
    async fn subdirectories_are_not_listed() {
        let directory = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::create_dir(directory.path().join("nested")).unwrap_or_else(|_| unreachable!());
        std::fs::write(directory.path().join("only.log"), b"data")
            .unwrap_or_else(|_| unreachable!());

        let store = FsLogFileStore::new();
        let entries = store
            .list_files(directory.path())
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(entries.len(), 1);
    }
}
