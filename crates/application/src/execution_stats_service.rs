use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tempora_core::AppResult;
use tempora_domain::{
    ConcurrencyBucket, ConcurrencyTieBreak, ExecutionInterval, bucket_counts, peak_concurrent,
};

/// Read-only port over job execution history.
#[async_trait]
pub trait ExecutionHistoryRepository: Send + Sync {
    /// Lists execution intervals overlapping the observation window.
    async fn list_intervals(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AppResult<Vec<ExecutionInterval>>;
}

/// Concurrency statistics for one observation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionWindowStats {
    /// Executions overlapping the window.
    pub total_executions: usize,
    /// Peak simultaneous execution count.
    pub peak_concurrent: usize,
    /// Per-bucket overlap counts across the window.
    pub buckets: Vec<ConcurrencyBucket>,
}

/// Computes concurrency statistics over execution history snapshots.
///
/// Pure read path: runs concurrently with maintenance without coordination
/// and tolerates rows disappearing into the archive between reads.
#[derive(Clone)]
pub struct ExecutionStatsService {
    repository: Arc<dyn ExecutionHistoryRepository>,
    tie_break: ConcurrencyTieBreak,
}

impl ExecutionStatsService {
    /// Creates a stats service with the default tie-break rule.
    #[must_use]
    pub fn new(repository: Arc<dyn ExecutionHistoryRepository>) -> Self {
        Self {
            repository,
            tie_break: ConcurrencyTieBreak::default(),
        }
    }

    /// Overrides the ordering rule for coincident start and end events.
    #[must_use]
    pub fn with_tie_break(mut self, tie_break: ConcurrencyTieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Computes peak concurrency and bucketed overlap counts for one
    /// observation window.
    pub async fn window_stats(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        bucket_width: Duration,
    ) -> AppResult<ExecutionWindowStats> {
        let intervals = self
            .repository
            .list_intervals(window_start, window_end)
            .await?;

        let buckets = bucket_counts(&intervals, window_start, window_end, bucket_width)?;

        Ok(ExecutionWindowStats {
            total_executions: intervals.len(),
            peak_concurrent: peak_concurrent(&intervals, self.tie_break),
            buckets,
        })
    }
}
