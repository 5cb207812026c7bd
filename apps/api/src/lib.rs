//! Control API - thin HTTP surface over the task repository, dispatcher,
//! and result store. Every handler is a short wrapper; no business logic
//! lives here beyond request parsing and response shaping.

pub mod health;
pub mod state;
pub mod stories;
pub mod tasks;

use std::sync::atomic::AtomicI64;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use core_config::{janitor::JanitorSettings, server::ServerConfig, store::StoreConfig, task::TaskSettings};
use core_config::{Environment, FromEnv};
use domain_engines::SysinfoMetrics;
use domain_tasks::{Dispatcher, RedisTaskRepository};
use eyre::{Result, WrapErr};
use task_store::{connect_from_config, Store};
use tower_http::trace::TraceLayer;
use tracing::info;
use web_support::ShutdownCoordinator;

use crate::state::AppState;

fn router(state: AppState) -> Router {
    let api_v1 = Router::new()
        .route("/tasks", post(tasks::create_task).get(tasks::list_tasks))
        .route("/tasks/statistics/summary", get(tasks::task_statistics))
        .route("/tasks/{task_id}", get(tasks::get_task))
        .route("/tasks/{task_id}/results", get(tasks::get_task_results))
        .route("/tasks/{task_id}/cancel", post(tasks::cancel_task))
        .route("/tasks/{task_id}/retry", post(tasks::retry_task))
        .route("/story/{story_name}/text", get(stories::get_story_text))
        .route("/health", get(health::health))
        .route("/health/workers", get(health::health_workers))
        .route("/health/metrics", get(health::health_metrics));

    Router::new()
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let server_config = ServerConfig::from_env().wrap_err("failed to load server configuration")?;
    let store_config = StoreConfig::from_env().wrap_err("failed to load store configuration")?;
    let task_settings = TaskSettings::from_env().wrap_err("failed to load task settings")?;
    let janitor_settings = JanitorSettings::from_env().wrap_err("failed to load janitor settings")?;

    info!("connecting to store...");
    let conn = connect_from_config(&store_config).await.wrap_err("failed to connect to store")?;
    let store = Store::new(conn);

    let repository = Arc::new(RedisTaskRepository::new(store.kv.clone()));
    let dispatcher = Arc::new(
        Dispatcher::new(store.stream, Arc::clone(&repository), task_settings.retry_limit)
            .await
            .wrap_err("failed to bootstrap dispatcher")?,
    );
    let result_store = Arc::new(domain_results::ResultStore::new(
        store.kv.clone(),
        task_settings.result_dir.clone(),
    ));

    let state = AppState {
        dispatcher,
        repository,
        result_store,
        kv: store.kv,
        metrics: Arc::new(SysinfoMetrics),
        task_settings,
        janitor_settings,
        last_sweep: Arc::new(AtomicI64::new(0)),
    };

    let shutdown = ShutdownCoordinator::new();
    let shutdown_signal = shutdown.clone();

    let addr = server_config.address();
    let listener = tokio::net::TcpListener::bind(addr.as_str())
        .await
        .wrap_err_with(|| format!("failed to bind {addr}"))?;
    info!(%addr, "control API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown_signal.wait_for_signal().await })
        .await
        .wrap_err("server error")?;

    info!("control API stopped cleanly");
    Ok(())
}
