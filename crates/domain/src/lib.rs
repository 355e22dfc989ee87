//! Domain types and pure algorithms for the Tempora data-lifecycle engine.

#![forbid(unsafe_code)]

mod concurrency;
mod retention;
mod run;

pub use concurrency::{
    ConcurrencyBucket, ConcurrencyTieBreak, ExecutionInterval, bucket_counts, peak_concurrent,
};
pub use retention::{ArchiveEntityKind, RetentionPolicy, RetentionPolicyInput};
pub use run::{OrchestrationCounters, OrchestrationRunStatus};
