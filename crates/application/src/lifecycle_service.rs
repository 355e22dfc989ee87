use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::lifecycle_ports::{LifecycleStore, LogFileStore, RetentionPolicySource};

mod archival;
mod maintenance;
mod purge;
mod reaper;

pub use archival::{ArchivalBatcher, ArchivalOutcome};
pub use maintenance::{EntityKindCount, MaintenanceResult};
pub use purge::ArchivePurger;
pub use reaper::LogFileReaper;

/// Orchestrates one full data-lifecycle maintenance run: batched archival
/// per entity kind, long-horizon archive purge, then log file reaping.
#[derive(Clone)]
pub struct MaintenanceService {
    policy_source: Arc<dyn RetentionPolicySource>,
    store: Arc<dyn LifecycleStore>,
    log_store: Arc<dyn LogFileStore>,
    log_directory: PathBuf,
    run_guard: Arc<Mutex<()>>,
}

impl MaintenanceService {
    /// Creates a maintenance service.
    #[must_use]
    pub fn new(
        policy_source: Arc<dyn RetentionPolicySource>,
        store: Arc<dyn LifecycleStore>,
        log_store: Arc<dyn LogFileStore>,
        log_directory: PathBuf,
    ) -> Self {
        Self {
            policy_source,
            store,
            log_store,
            log_directory,
            run_guard: Arc::new(Mutex::new(())),
        }
    }
}

#[cfg(test)]
mod tests;
