//! Tempora data-lifecycle maintenance runtime.

#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tempora_application::{MaintenanceResult, MaintenanceService};
use tempora_core::{AppError, AppResult};
use tempora_infrastructure::{EnvRetentionPolicySource, FsLogFileStore, PostgresLifecycleStore};

#[derive(Debug, Clone)]
struct MaintenanceConfig {
    database_url: String,
    log_directory: PathBuf,
    interval_seconds: u64,
    run_once: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = MaintenanceConfig::load()?;
    let pool = connect_and_migrate(config.database_url.as_str()).await?;
    let service = build_maintenance_service(pool, config.log_directory.clone());

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    info!(
        log_directory = %config.log_directory.display(),
        interval_seconds = config.interval_seconds,
        run_once = config.run_once,
        "tempora-maintenance started"
    );

    loop {
        match service.run_maintenance(&shutdown).await {
            Ok(result) => log_maintenance_result(&result),
            Err(AppError::Conflict(message)) => {
                warn!(reason = %message, "maintenance run skipped");
            }
            Err(error) => {
                warn!(error = %error, "maintenance run failed");
            }
        }

        if config.run_once || shutdown.is_cancelled() {
            break;
        }

        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(Duration::from_secs(config.interval_seconds)) => {}
        }
    }

    info!("tempora-maintenance stopped");
    Ok(())
}

fn log_maintenance_result(result: &MaintenanceResult) {
    if result.success {
        info!(
            archived = result.archived_total(),
            purged = result.purged_total(),
            reaped_log_files = result.reaped_log_files,
            cancelled = result.cancelled,
            "maintenance run finished"
        );
    } else {
        warn!(
            archived = result.archived_total(),
            purged = result.purged_total(),
            reaped_log_files = result.reaped_log_files,
            cancelled = result.cancelled,
            error = result.error_message.as_deref().unwrap_or("unknown"),
            "maintenance run finished with errors"
        );
    }
}

fn spawn_shutdown_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(error = %error, "failed to listen for shutdown signal");
            return;
        }
        info!("shutdown requested");
        shutdown.cancel();
    });
}

async fn connect_and_migrate(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

fn build_maintenance_service(pool: PgPool, log_directory: PathBuf) -> MaintenanceService {
    MaintenanceService::new(
        Arc::new(EnvRetentionPolicySource::new()),
        Arc::new(PostgresLifecycleStore::new(pool)),
        Arc::new(FsLogFileStore::new()),
        log_directory,
    )
}

impl MaintenanceConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let log_directory = env::var("TEMPORA_LOG_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("logs"));
        let interval_seconds = parse_env_u64("TEMPORA_MAINTENANCE_INTERVAL_SECONDS", 3600)?;
        let run_once = parse_env_bool("TEMPORA_MAINTENANCE_RUN_ONCE", false)?;

        if interval_seconds == 0 {
            return Err(AppError::Validation(
                "TEMPORA_MAINTENANCE_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            log_directory,
            interval_seconds,
            run_once,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
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
