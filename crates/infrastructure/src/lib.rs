//! Infrastructure adapters for the Tempora data-lifecycle engine.

#![forbid(unsafe_code)]

mod env_retention_policy_source;
mod fs_log_file_store;
mod in_memory_orchestration_run_repository;
mod postgres_execution_history_repository;
mod postgres_lifecycle_store;
mod postgres_orchestration_run_repository;

pub use env_retention_policy_source::EnvRetentionPolicySource;
pub use fs_log_file_store::FsLogFileStore;
pub use in_memory_orchestration_run_repository::InMemoryOrchestrationRunRepository;
pub use postgres_execution_history_repository::PostgresExecutionHistoryRepository;
pub use postgres_lifecycle_store::PostgresLifecycleStore;
pub use postgres_orchestration_run_repository::PostgresOrchestrationRunRepository;
