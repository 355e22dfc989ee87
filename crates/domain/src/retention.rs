use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tempora_core::{AppError, AppResult};

/// Entity classes whose operational rows age out into archive storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveEntityKind {
    /// Scheduled job definitions.
    Job,
    /// Job execution history rows.
    JobExecution,
    /// Audit log entries.
    AuditLog,
    /// Schedule execution interval rows produced by the trigger engine.
    ScheduleExecution,
}

impl ArchiveEntityKind {
    /// All entity kinds in maintenance processing order.
    pub const ALL: [Self; 4] = [
        Self::Job,
        Self::JobExecution,
        Self::AuditLog,
        Self::ScheduleExecution,
    ];

    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::JobExecution => "job_execution",
            Self::AuditLog => "audit_log",
            Self::ScheduleExecution => "schedule_execution",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "job" => Ok(Self::Job),
            "job_execution" => Ok(Self::JobExecution),
            "audit_log" => Ok(Self::AuditLog),
            "schedule_execution" => Ok(Self::ScheduleExecution),
            _ => Err(AppError::Validation(format!(
                "unknown archive entity kind '{value}'"
            ))),
        }
    }
}

/// Input payload used to construct a validated retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicyInput {
    /// Retention for scheduled job definitions.
    pub job_retention: Duration,
    /// Retention for job execution history.
    pub job_execution_retention: Duration,
    /// Retention for audit log entries.
    pub audit_log_retention: Duration,
    /// Retention for schedule execution intervals.
    pub schedule_execution_retention: Duration,
    /// Retention for archived rows, after which they are purged for good.
    pub archive_retention: Duration,
    /// Retention for on-disk log files.
    pub log_retention: Duration,
    /// Maximum rows moved per archival batch.
    pub batch_size: usize,
    /// Whether archival and purge steps run at all.
    pub archival_enabled: bool,
}

/// Per-entity-class retention cutoffs and batching configuration for one
/// maintenance run. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    job_retention: Duration,
    job_execution_retention: Duration,
    audit_log_retention: Duration,
    schedule_execution_retention: Duration,
    archive_retention: Duration,
    log_retention: Duration,
    batch_size: usize,
    archival_enabled: bool,
}

impl RetentionPolicy {
    /// Creates a validated retention policy.
    ///
    /// Archive retention must strictly exceed every operational retention so
    /// that archives always outlive the operational copies they replace.
    pub fn new(input: RetentionPolicyInput) -> AppResult<Self> {
        let RetentionPolicyInput {
            job_retention,
            job_execution_retention,
            audit_log_retention,
            schedule_execution_retention,
            archive_retention,
            log_retention,
            batch_size,
            archival_enabled,
        } = input;

        if batch_size == 0 {
            return Err(AppError::Validation(
                "batch_size must be greater than zero".to_owned(),
            ));
        }

        for (name, retention) in [
            ("job_retention", job_retention),
            ("job_execution_retention", job_execution_retention),
            ("audit_log_retention", audit_log_retention),
            ("schedule_execution_retention", schedule_execution_retention),
            ("archive_retention", archive_retention),
            ("log_retention", log_retention),
        ] {
            if retention <= Duration::zero() {
                return Err(AppError::Validation(format!(
                    "{name} must be a positive duration"
                )));
            }
        }

        for (name, retention) in [
            ("job_retention", job_retention),
            ("job_execution_retention", job_execution_retention),
            ("audit_log_retention", audit_log_retention),
            ("schedule_execution_retention", schedule_execution_retention),
        ] {
            if archive_retention <= retention {
                return Err(AppError::Validation(format!(
                    "archive_retention must be strictly greater than {name}"
                )));
            }
        }

        Ok(Self {
            job_retention,
            job_execution_retention,
            audit_log_retention,
            schedule_execution_retention,
            archive_retention,
            log_retention,
            batch_size,
            archival_enabled,
        })
    }

    /// Returns operational retention for one entity kind.
    #[must_use]
    pub fn operational_retention(&self, kind: ArchiveEntityKind) -> Duration {
        match kind {
            ArchiveEntityKind::Job => self.job_retention,
            ArchiveEntityKind::JobExecution => self.job_execution_retention,
            ArchiveEntityKind::AuditLog => self.audit_log_retention,
            ArchiveEntityKind::ScheduleExecution => self.schedule_execution_retention,
        }
    }

    /// Returns the archival cutoff for one entity kind; rows strictly older
    /// than the cutoff are eligible for archival.
    #[must_use]
    pub fn operational_cutoff(&self, kind: ArchiveEntityKind, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.operational_retention(kind)
    }

    /// Returns the purge cutoff; archive rows archived strictly before it
    /// are deleted for good.
    #[must_use]
    pub fn archive_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.archive_retention
    }

    /// Returns the log file reaping cutoff.
    #[must_use]
    pub fn log_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.log_retention
    }

    /// Returns maximum rows moved per archival batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns whether archival and purge steps are enabled.
    #[must_use]
    pub fn archival_enabled(&self) -> bool {
        self.archival_enabled
    }
}
