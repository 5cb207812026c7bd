use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::Utc;
use task_store::KvStore;
use tracing::warn;

/// Live counters a running worker exposes through its heartbeat hash.
#[derive(Default)]
pub struct WorkerCounters {
    pub active: AtomicU32,
    pub completed: AtomicU32,
    pub failed: AtomicU32,
}

fn worker_key(worker_id: &str) -> String {
    format!("worker:{worker_id}")
}

fn heartbeat_sentinel_key(worker_id: &str) -> String {
    format!("worker:{worker_id}:heartbeat")
}

/// Writes the worker status hash plus a short-TTL sentinel key the janitor
/// uses to distinguish a live-but-quiet worker from a crashed one.
pub async fn send_heartbeat(
    kv: &KvStore,
    worker_id: &str,
    running: bool,
    counters: &WorkerCounters,
) {
    let status = if running { "active" } else { "stopping" };
    let last_heartbeat = Utc::now().to_rfc3339();
    let active_tasks = counters.active.load(Ordering::Relaxed).to_string();
    let completed_tasks = counters.completed.load(Ordering::Relaxed).to_string();
    let failed_tasks = counters.failed.load(Ordering::Relaxed).to_string();

    let fields = [
        ("worker_id", worker_id),
        ("status", status),
        ("last_heartbeat", last_heartbeat.as_str()),
        ("active_tasks", active_tasks.as_str()),
        ("completed_tasks", completed_tasks.as_str()),
        ("failed_tasks", failed_tasks.as_str()),
    ];

    if let Err(err) = kv.hset_many(&worker_key(worker_id), &fields).await {
        warn!(worker_id, %err, "failed to send heartbeat");
        return;
    }

    if let Err(err) = kv
        .set_ex(
            &heartbeat_sentinel_key(worker_id),
            &Utc::now().timestamp().to_string(),
            Duration::from_secs(60),
        )
        .await
    {
        warn!(worker_id, %err, "failed to refresh heartbeat sentinel");
    }
}

/// Removes a worker's hash and sentinel on clean shutdown.
pub async fn clear_heartbeat(kv: &KvStore, worker_id: &str) {
    let _ = kv.delete(&worker_key(worker_id)).await;
    let _ = kv.delete(&heartbeat_sentinel_key(worker_id)).await;
}
