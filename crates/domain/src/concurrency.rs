use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tempora_core::{AppError, AppResult};

/// One job execution interval; open when the execution is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionInterval {
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl ExecutionInterval {
    /// Creates a validated execution interval.
    pub fn new(started_at: DateTime<Utc>, finished_at: Option<DateTime<Utc>>) -> AppResult<Self> {
        if let Some(finished_at) = finished_at
            && finished_at < started_at
        {
            return Err(AppError::Validation(
                "execution interval must not finish before it starts".to_owned(),
            ));
        }

        Ok(Self {
            started_at,
            finished_at,
        })
    }

    /// Returns execution start time.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns execution finish time when the execution has ended.
    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Returns whether the execution is still running.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.finished_at.is_none()
    }
}

/// Ordering rule for start and end events sharing one timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyTieBreak {
    /// Ends are applied before starts at the same instant, so an execution
    /// ending exactly when another starts never double-counts.
    #[default]
    DecrementFirst,
    /// Starts are applied before ends, counting back-to-back executions as
    /// momentarily overlapping.
    IncrementFirst,
}

/// Peak count of simultaneously running executions across the intervals.
///
/// Sweep-line over signed events: +1 at each start, -1 at each end; open
/// intervals emit no end event and stay active through the end of the
/// observation window. Zero intervals yields zero.
#[must_use]
pub fn peak_concurrent(intervals: &[ExecutionInterval], tie_break: ConcurrencyTieBreak) -> usize {
    let mut events: Vec<(DateTime<Utc>, i32)> = Vec::with_capacity(intervals.len() * 2);
    for interval in intervals {
        events.push((interval.started_at(), 1));
        if let Some(finished_at) = interval.finished_at() {
            events.push((finished_at, -1));
        }
    }

    match tie_break {
        ConcurrencyTieBreak::DecrementFirst => {
            events.sort_by_key(|(timestamp, delta)| (*timestamp, *delta));
        }
        ConcurrencyTieBreak::IncrementFirst => {
            events.sort_by_key(|(timestamp, delta)| (*timestamp, -*delta));
        }
    }

    let mut active: i64 = 0;
    let mut peak: i64 = 0;
    for (_, delta) in events {
        active += i64::from(delta);
        peak = peak.max(active);
    }

    usize::try_from(peak).unwrap_or(0)
}

/// One time bucket of the observation window with its overlap count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyBucket {
    /// Inclusive bucket start.
    pub bucket_start: DateTime<Utc>,
    /// Number of executions active at any point inside the bucket.
    pub active: usize,
}

/// Splits the observation window into fixed-width buckets and counts the
/// executions overlapping each bucket. An execution ending exactly at a
/// bucket boundary belongs to the earlier bucket only.
pub fn bucket_counts(
    intervals: &[ExecutionInterval],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    bucket_width: Duration,
) -> AppResult<Vec<ConcurrencyBucket>> {
    if bucket_width <= Duration::zero() {
        return Err(AppError::Validation(
            "bucket_width must be a positive duration".to_owned(),
        ));
    }

    if window_end <= window_start {
        return Err(AppError::Validation(
            "observation window must end after it starts".to_owned(),
        ));
    }

    let mut buckets = Vec::new();
    let mut bucket_start = window_start;
    while bucket_start < window_end {
        let bucket_end = (bucket_start + bucket_width).min(window_end);
        let active = intervals
            .iter()
            .filter(|interval| {
                interval.started_at() < bucket_end
                    && interval
                        .finished_at()
                        .is_none_or(|finished_at| finished_at > bucket_start)
            })
            .count();
        buckets.push(ConcurrencyBucket {
            bucket_start,
            active,
        });
        bucket_start = bucket_end;
    }

    Ok(buckets)
}
