use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempora_core::AppResult;

/// One on-disk log file candidate for reaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileEntry {
    /// Absolute file path.
    pub path: PathBuf,
    /// Last-modified timestamp.
    pub modified_at: DateTime<Utc>,
}

/// Filesystem port for log file listing and deletion.
#[async_trait]
pub trait LogFileStore: Send + Sync {
    /// Lists files in the directory. A missing directory yields no entries.
    async fn list_files(&self, directory: &Path) -> AppResult<Vec<LogFileEntry>>;

    /// Deletes one file.
    async fn delete_file(&self, path: &Path) -> AppResult<()>;
}
