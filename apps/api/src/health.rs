//! `/health` and its sub-aggregates: store connectivity, resource headroom,
//! and a live roster of worker heartbeats.

use std::path::Path;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use domain_tasks::TaskRepository;
use serde::Serialize;
use web_support::health::WorkerStatusView;
use web_support::{AppError, HealthResponse};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let memory_usage = state.metrics.memory_usage_percent();
    let store_connected = state.kv.ping().await.is_ok();
    let storage_available = state.metrics.storage_available(Path::new(&state.task_settings.upload_dir));

    Json(HealthResponse::new(memory_usage, store_connected, storage_available))
}

const HEARTBEAT_PREFIX: &str = "worker:";
const HEARTBEAT_SUFFIX: &str = ":heartbeat";

pub async fn health_workers(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkerStatusView>>, AppError> {
    let keys = state
        .kv
        .scan_keys(&format!("{HEARTBEAT_PREFIX}*{HEARTBEAT_SUFFIX}"))
        .await?;

    let mut workers = Vec::new();
    for key in keys {
        let Some(worker_id) = key
            .strip_prefix(HEARTBEAT_PREFIX)
            .and_then(|s| s.strip_suffix(HEARTBEAT_SUFFIX))
        else {
            continue;
        };

        let fields = state.kv.hgetall(&format!("{HEARTBEAT_PREFIX}{worker_id}")).await?;
        if fields.is_empty() {
            continue;
        }

        let last_heartbeat = fields
            .get("last_heartbeat")
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        workers.push(WorkerStatusView {
            worker_id: worker_id.to_string(),
            status: fields.get("status").cloned().unwrap_or_else(|| "unknown".to_string()),
            last_heartbeat,
            active_tasks: fields.get("active_tasks").and_then(|v| v.parse().ok()).unwrap_or(0),
            completed_tasks: fields
                .get("completed_tasks")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            failed_tasks: fields.get("failed_tasks").and_then(|v| v.parse().ok()).unwrap_or(0),
        });
    }

    Ok(Json(workers))
}

#[derive(Debug, Serialize)]
pub struct SystemMetricsView {
    pub memory_usage_percent: f32,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub tasks: domain_tasks::TaskStatistics,
    pub system: SystemMetricsView,
    pub workers: usize,
    pub timestamp: DateTime<Utc>,
}

pub async fn health_metrics(State(state): State<AppState>) -> Result<Json<MetricsResponse>, AppError> {
    let tasks = state.repository.statistics().await?;
    let worker_keys = state
        .kv
        .scan_keys(&format!("{HEARTBEAT_PREFIX}*{HEARTBEAT_SUFFIX}"))
        .await?;

    Ok(Json(MetricsResponse {
        tasks,
        system: SystemMetricsView {
            memory_usage_percent: state.metrics.memory_usage_percent(),
        },
        workers: worker_keys.len(),
        timestamp: Utc::now(),
    }))
}
