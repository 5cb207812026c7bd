//! Shared handler context, built once at startup and cloned into every
//! request (everything inside is an `Arc` or otherwise cheap to clone).

use std::sync::atomic::AtomicI64;
use std::sync::Arc;

use core_config::janitor::JanitorSettings;
use core_config::task::TaskSettings;
use domain_engines::SystemMetrics;
use domain_results::ResultStore;
use domain_tasks::{Dispatcher, RedisTaskRepository};
use task_store::KvStore;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher<RedisTaskRepository>>,
    pub repository: Arc<RedisTaskRepository>,
    pub result_store: Arc<ResultStore>,
    pub kv: KvStore,
    pub metrics: Arc<dyn SystemMetrics>,
    pub task_settings: TaskSettings,
    pub janitor_settings: JanitorSettings,
    /// Unix timestamp of the last request-path sweep, gating how often
    /// `create_task` piggybacks a GC pass onto otherwise unrelated traffic.
    pub last_sweep: Arc<AtomicI64>,
}
