//! # Lifecycle Scheduler
//!
//! Runs the three reconciliation schedulers against the configured database
//! until SIGINT or SIGTERM.
//!
//! ```bash
//! lifecycle-scheduler [config.toml]
//! ```
//!
//! The config path may also come from `RENDEZVOUS_CONFIG`. Environment
//! variables prefixed `RENDEZVOUS__` and `DATABASE_URL` override the file.

use std::path::PathBuf;

use anyhow::Context;
use rendezvous_core::config::LifecycleConfig;
use rendezvous_core::database::{DatabaseConnection, DatabaseMigrations};
use rendezvous_core::logging::init_structured_logging;
use rendezvous_core::orchestration::LifecycleContext;
use rendezvous_core::scheduler::SchedulerSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const CONFIG_PATH_VAR: &str = "RENDEZVOUS_CONFIG";

/// Cancelled on the first SIGINT or SIGTERM
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("Received SIGINT, initiating shutdown"),
                        _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable, waiting for SIGINT only");
                    let _ = ctrl_c.await;
                    info!("Received SIGINT, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("Received Ctrl+C, initiating shutdown");
        }

        trigger.cancel();
    });

    token
}

fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let path = config_path();
    let config = LifecycleConfig::load(path.as_deref()).context("loading configuration")?;
    info!(
        config_file = ?path,
        max_connections = config.database.max_connections,
        inquiry_expiry_tick_secs = config.scheduler.inquiry_expiry_tick_seconds,
        unpaid_service_tick_secs = config.scheduler.unpaid_service_tick_seconds,
        service_status_tick_secs = config.scheduler.service_status_tick_seconds,
        "Configuration loaded"
    );

    let connection = DatabaseConnection::connect(&config.database)
        .await
        .context("connecting to the database")?;
    if !connection.health_check().await.context("database health check")? {
        anyhow::bail!("database health check returned an unexpected result");
    }
    DatabaseMigrations::run_all(connection.pool())
        .await
        .context("running migrations")?;

    let context = LifecycleContext::from_pool(connection.pool().clone(), config.policy.clone());
    let token = install_signal_handler();
    let schedulers = SchedulerSet::spawn(context, &config.scheduler, token.clone());

    token.cancelled().await;
    schedulers.shutdown().await;
    connection.close().await;

    info!("Lifecycle scheduler exited cleanly");
    Ok(())
}
