use async_trait::async_trait;
use tempora_core::AppResult;
use tempora_domain::RetentionPolicy;

/// Source of the externally editable retention configuration.
///
/// Implementations must read current values on every call; the orchestrator
/// loads the policy at the start of each run and never caches it across runs.
#[async_trait]
pub trait RetentionPolicySource: Send + Sync {
    /// Loads and validates the current retention policy.
    async fn load(&self) -> AppResult<RetentionPolicy>;
}
