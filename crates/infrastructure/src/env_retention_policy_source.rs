use std::env;

use async_trait::async_trait;
use chrono::Duration;

use tempora_application::RetentionPolicySource;
use tempora_core::{AppError, AppResult};
use tempora_domain::{RetentionPolicy, RetentionPolicyInput};

/// Environment-backed retention policy source.
///
/// Values are read on every load, so operators can change retention
/// settings between maintenance runs without a restart.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvRetentionPolicySource;

impl EnvRetentionPolicySource {
    /// Creates an environment-backed policy source.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RetentionPolicySource for EnvRetentionPolicySource {
    async fn load(&self) -> AppResult<RetentionPolicy> {
        RetentionPolicy::new(RetentionPolicyInput {
            job_retention: parse_env_days("TEMPORA_JOB_RETENTION_DAYS", 365)?,
            job_execution_retention: parse_env_days("TEMPORA_JOB_EXECUTION_RETENTION_DAYS", 90)?,
            audit_log_retention: parse_env_days("TEMPORA_AUDIT_LOG_RETENTION_DAYS", 180)?,
            schedule_execution_retention: parse_env_days(
                "TEMPORA_SCHEDULE_EXECUTION_RETENTION_DAYS",
                90,
            )?,
            archive_retention: parse_env_days("TEMPORA_ARCHIVE_RETENTION_DAYS", 730)?,
            log_retention: parse_env_days("TEMPORA_LOG_RETENTION_DAYS", 14)?,
            batch_size: parse_env_usize("TEMPORA_ARCHIVAL_BATCH_SIZE", 500)?,
            archival_enabled: parse_env_bool("TEMPORA_ARCHIVAL_ENABLED", true)?,
        })
    }
}

fn parse_env_days(name: &str, default: i64) -> AppResult<Duration> {
    match env::var(name) {
        Ok(value) => value
            .parse::<i64>()
            .map(Duration::days)
            .map_err(|error| {
                AppError::Validation(format!("invalid {name} value '{value}': {error}"))
            }),
        Err(_) => Ok(Duration::days(default)),
    }
}

fn parse_env_usize(name: &str, default: usize) -> AppResult<usize> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> AppResult<bool> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(AppError::Validation(format!(
                "invalid {name} value '{value}': expected a boolean"
            ))),
        },
        Err(_) => Ok(default),
    }
}
