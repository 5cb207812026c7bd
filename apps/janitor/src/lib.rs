//! Standalone garbage collector.
//!
//! Runs the same sweep the dispatcher can gate off `create_task` calls, but
//! on its own interval loop, for deployments that would rather not piggyback
//! GC on request traffic. Safe to run alongside the request-path sweep: the
//! underlying sweep is idempotent.

use std::sync::Arc;
use std::time::Duration;

use core_config::{janitor::JanitorSettings, store::StoreConfig, task::TaskSettings};
use core_config::{Environment, FromEnv};
use domain_tasks::{Dispatcher, RedisTaskRepository};
use eyre::{Result, WrapErr};
use task_store::{connect_from_config, Store};
use tracing::{error, info};
use web_support::ShutdownCoordinator;

pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let store_config = StoreConfig::from_env().wrap_err("failed to load store configuration")?;
    let janitor_settings = JanitorSettings::from_env().wrap_err("failed to load janitor settings")?;
    let task_settings = TaskSettings::from_env().wrap_err("failed to load task settings")?;

    info!(interval_secs = janitor_settings.interval_secs, "starting janitor");

    let conn = connect_from_config(&store_config)
        .await
        .wrap_err("failed to connect to store")?;
    let store = Store::new(conn);

    let repository = Arc::new(RedisTaskRepository::new(store.kv));
    let dispatcher = Dispatcher::new(store.stream, Arc::clone(&repository), task_settings.retry_limit)
        .await
        .wrap_err("failed to bootstrap dispatcher")?;

    let shutdown = ShutdownCoordinator::new();
    let shutdown_for_signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_for_signal.wait_for_signal().await;
    });

    let task_retention = Duration::from_secs(janitor_settings.task_retention_secs);
    let consumer_idle_threshold = Duration::from_millis(janitor_settings.consumer_idle_threshold_ms);
    let interval = Duration::from_secs(janitor_settings.interval_secs);
    let mut shutdown_rx = shutdown.subscribe();

    while !shutdown.is_shutting_down() {
        match dispatcher.sweep(task_retention, consumer_idle_threshold).await {
            Ok(report) => {
                if report.tasks_purged > 0 || report.consumers_removed > 0 {
                    info!(
                        tasks_purged = report.tasks_purged,
                        consumers_removed = report.consumers_removed,
                        "sweep completed"
                    );
                }
            }
            Err(err) => error!(%err, "sweep failed"),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown_rx.changed() => {}
        }
    }

    info!("janitor stopped cleanly");
    Ok(())
}
