//! Translation worker service.
//!
//! Claims tasks from the shared `translation_tasks` stream, runs the
//! STT -> WER-gate -> MT pipeline against each, and writes results through
//! the two-tier result store. See [`runtime::WorkerRuntime`] for the main
//! loop.

pub mod error;
pub mod heartbeat;
pub mod pipeline;
pub mod runtime;

use std::path::PathBuf;
use std::sync::Arc;

use core_config::{engine::EngineSettings, store::StoreConfig, task::TaskSettings, worker::WorkerSettings};
use core_config::{Environment, FromEnv};
use domain_engines::{EchoSttEngine, LevenshteinWer, SysinfoMetrics, TaggingMtEngine};
use domain_results::ResultStore;
use domain_tasks::{Dispatcher, RedisTaskRepository};
use eyre::{Result, WrapErr};
use task_store::{connect_from_config, Store};
use tracing::info;
use web_support::ShutdownCoordinator;

use crate::heartbeat::WorkerCounters;
use crate::runtime::WorkerRuntime;

/// Boots the worker: loads configuration, connects to the store, bootstraps
/// the dispatcher's consumer group, reclaims its own previously-pending
/// entries under this identity, then runs until shutdown.
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let worker_id = format!("worker-{}", uuid::Uuid::new_v4());
    info!(worker_id, "starting translation worker");

    let store_config = StoreConfig::from_env().wrap_err("failed to load store configuration")?;
    let worker_settings = WorkerSettings::from_env().wrap_err("failed to load worker settings")?;
    let task_settings = TaskSettings::from_env().wrap_err("failed to load task settings")?;
    let engine_settings = EngineSettings::from_env().wrap_err("failed to load engine settings")?;

    info!("connecting to store...");
    let conn = connect_from_config(&store_config)
        .await
        .wrap_err("failed to connect to store")?;
    let store = Store::new(conn);

    let repository = Arc::new(RedisTaskRepository::new(store.kv.clone()));
    let dispatcher = Arc::new(
        Dispatcher::new(store.stream, Arc::clone(&repository), task_settings.retry_limit)
            .await
            .wrap_err("failed to bootstrap dispatcher")?,
    );

    let reclaimed = dispatcher
        .reclaim_own_pending_on_startup(&worker_id)
        .await
        .wrap_err("failed to reclaim own pending entries")?;
    if reclaimed > 0 {
        info!(count = reclaimed, "reclaimed in-flight entries from a previous run");
    }

    let result_store = Arc::new(ResultStore::new(store.kv.clone(), PathBuf::from(&task_settings.result_dir)));

    let shutdown = ShutdownCoordinator::new();
    let shutdown_for_signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_for_signal.wait_for_signal().await;
    });

    let runtime = WorkerRuntime {
        worker_id,
        kv: store.kv,
        dispatcher,
        repository,
        result_store,
        stt: Arc::new(EchoSttEngine),
        mt: Arc::new(TaggingMtEngine),
        wer: Arc::new(LevenshteinWer),
        wer_threshold: engine_settings.wer_threshold,
        metrics: Arc::new(SysinfoMetrics),
        pool: Arc::new(tokio::sync::Semaphore::new(worker_settings.max_threads)),
        settings: worker_settings,
        shutdown,
        counters: Arc::new(WorkerCounters::default()),
    };

    runtime.run().await;
    info!("translation worker stopped cleanly");
    Ok(())
}
