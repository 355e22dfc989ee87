//! Application services and ports for the Tempora data-lifecycle engine.

#![forbid(unsafe_code)]

mod execution_stats_service;
mod lifecycle_ports;
mod lifecycle_service;
mod orchestration_ports;
mod orchestration_service;

pub use execution_stats_service::{
    ExecutionHistoryRepository, ExecutionStatsService, ExecutionWindowStats,
};
pub use lifecycle_ports::{
    ArchivableRow, ArchivedRow, LifecycleStore, LogFileEntry, LogFileStore, RetentionPolicySource,
};
pub use lifecycle_service::{
    ArchivalBatcher, ArchivalOutcome, ArchivePurger, EntityKindCount, LogFileReaper,
    MaintenanceResult, MaintenanceService,
};
pub use orchestration_ports::{
    CompleteOrchestrationRunInput, OrchestrationRun, OrchestrationRunRepository,
};
pub use orchestration_service::{
    OrchestrationHealth, OrchestrationHealthStatus, OrchestrationRunService,
};
