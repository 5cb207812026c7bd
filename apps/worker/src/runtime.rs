//! Main worker loop: heartbeat, health gate, orphan sweep, bounded-
//! concurrency claim-and-process.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use core_config::worker::WorkerSettings;
use domain_engines::{MtEngine, SttEngine, SystemMetrics, WerCalculator};
use domain_results::ResultStore;
use domain_tasks::{ClaimedTask, Dispatcher, StatusUpdate, TaskRepository, TaskStatus};
use task_store::KvStore;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use web_support::ShutdownCoordinator;

use crate::heartbeat::{clear_heartbeat, send_heartbeat, WorkerCounters};
use crate::pipeline::process_task;

pub struct WorkerRuntime<R: TaskRepository + 'static> {
    pub worker_id: String,
    pub kv: KvStore,
    pub dispatcher: Arc<Dispatcher<R>>,
    pub repository: Arc<R>,
    pub result_store: Arc<ResultStore>,
    pub stt: Arc<dyn SttEngine>,
    pub mt: Arc<dyn MtEngine>,
    pub wer: Arc<dyn WerCalculator>,
    pub wer_threshold: f32,
    pub metrics: Arc<dyn SystemMetrics>,
    pub settings: WorkerSettings,
    pub shutdown: ShutdownCoordinator,
    pub counters: Arc<WorkerCounters>,
    /// Bounds how many claimed tasks run their pipeline concurrently,
    /// independent of how many are pulled off the stream per loop tick.
    pub pool: Arc<Semaphore>,
}

impl<R: TaskRepository + 'static> WorkerRuntime<R> {
    /// Runs until shutdown is signaled, then drains in-flight work and
    /// clears the heartbeat hash.
    pub async fn run(&self) {
        info!(worker_id = %self.worker_id, "translation worker started");
        let worker_timeout = Duration::from_secs(self.settings.timeout_secs);

        while !self.shutdown.is_shutting_down() {
            send_heartbeat(&self.kv, &self.worker_id, true, &self.counters).await;

            if !self.is_healthy().await {
                warn!(worker_id = %self.worker_id, "system resources insufficient, pausing");
                tokio::time::sleep(Duration::from_secs(10)).await;
                continue;
            }

            let mut join_set = JoinSet::new();

            match self.dispatcher.claim_orphaned(&self.worker_id, worker_timeout).await {
                Ok(orphaned) => self.spawn_all(&mut join_set, orphaned),
                Err(err) => error!(worker_id = %self.worker_id, %err, "failed to claim orphaned tasks"),
            }

            match self
                .dispatcher
                .claim_pending(&self.worker_id, self.settings.batch_size)
                .await
            {
                Ok(claimed) => self.spawn_all(&mut join_set, claimed),
                Err(err) => error!(worker_id = %self.worker_id, %err, "failed to claim pending tasks"),
            }

            while let Some(result) = join_set.join_next().await {
                if let Err(err) = result {
                    error!(worker_id = %self.worker_id, %err, "task execution panicked");
                }
            }

            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        send_heartbeat(&self.kv, &self.worker_id, false, &self.counters).await;
        clear_heartbeat(&self.kv, &self.worker_id).await;
        info!(worker_id = %self.worker_id, "translation worker stopped");
    }

    fn spawn_all(&self, join_set: &mut JoinSet<()>, claimed: Vec<ClaimedTask>) {
        for task in claimed {
            let dispatcher = Arc::clone(&self.dispatcher);
            let repository = Arc::clone(&self.repository);
            let result_store = Arc::clone(&self.result_store);
            let stt = Arc::clone(&self.stt);
            let mt = Arc::clone(&self.mt);
            let wer = Arc::clone(&self.wer);
            let wer_threshold = self.wer_threshold;
            let counters = Arc::clone(&self.counters);
            let worker_id = self.worker_id.clone();
            let pool = Arc::clone(&self.pool);

            join_set.spawn(async move {
                let _permit = pool.acquire_owned().await.expect("semaphore never closed");
                counters.active.fetch_add(1, Ordering::Relaxed);
                let outcome = execute_claimed_task(
                    task,
                    dispatcher.as_ref(),
                    repository.as_ref(),
                    result_store.as_ref(),
                    stt.as_ref(),
                    mt.as_ref(),
                    wer.as_ref(),
                    wer_threshold,
                )
                .await;
                counters.active.fetch_sub(1, Ordering::Relaxed);

                match outcome {
                    TaskOutcome::Completed => {
                        counters.completed.fetch_add(1, Ordering::Relaxed);
                    }
                    TaskOutcome::Failed | TaskOutcome::Cancelled => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                let _ = worker_id;
            });
        }
    }

    async fn is_healthy(&self) -> bool {
        if self.metrics.memory_usage_percent() > self.settings.memory_limit_percent {
            return false;
        }
        if self.kv.ping().await.is_err() {
            error!("store connection unhealthy");
            return false;
        }
        true
    }
}

enum TaskOutcome {
    Completed,
    Failed,
    Cancelled,
}

/// Executes the STT/MT pipeline for one claimed task, driving its status
/// through PROCESSING(0.2) -> PROCESSING(0.8) -> COMPLETED|FAILED, always
/// ACKing so the stream entry never stays pending forever.
async fn execute_claimed_task<R: TaskRepository>(
    claimed: ClaimedTask,
    dispatcher: &Dispatcher<R>,
    repository: &R,
    result_store: &ResultStore,
    stt: &dyn SttEngine,
    mt: &dyn MtEngine,
    wer: &dyn WerCalculator,
    wer_threshold: f32,
) -> TaskOutcome {
    let task_id = claimed.task.task_id.clone();
    info!(task_id, "processing task");

    let outcome = run_pipeline(
        &claimed,
        repository,
        result_store,
        stt,
        mt,
        wer,
        wer_threshold,
    )
    .await;

    if let Err(err) = dispatcher.acknowledge(&claimed.entry_id).await {
        error!(task_id, %err, "failed to acknowledge stream entry");
    }

    outcome
}

async fn run_pipeline<R: TaskRepository>(
    claimed: &ClaimedTask,
    repository: &R,
    result_store: &ResultStore,
    stt: &dyn SttEngine,
    mt: &dyn MtEngine,
    wer: &dyn WerCalculator,
    wer_threshold: f32,
) -> TaskOutcome {
    let task_id = &claimed.task.task_id;

    if let Err(err) = repository
        .update_status(task_id, StatusUpdate::to(TaskStatus::Processing).with_progress(0.2))
        .await
    {
        if is_cancelled(repository, task_id).await {
            info!(task_id, "task cancelled before processing update");
            return TaskOutcome::Cancelled;
        }
        error!(task_id, %err, "failed to mark task processing");
        return TaskOutcome::Failed;
    }

    if is_cancelled(repository, task_id).await {
        info!(task_id, "task cancelled before pipeline ran");
        return TaskOutcome::Cancelled;
    }

    let packed = match process_task(&claimed.task, stt, mt, wer, wer_threshold).await {
        Ok(packed) => packed,
        Err(err) => {
            error!(task_id, %err, "pipeline failed");
            fail_task(repository, task_id, &err.to_string()).await;
            return TaskOutcome::Failed;
        }
    };

    if is_cancelled(repository, task_id).await {
        info!(task_id, "task cancelled after pipeline ran");
        return TaskOutcome::Cancelled;
    }

    if let Err(err) = repository
        .update_status(task_id, StatusUpdate::to(TaskStatus::Processing).with_progress(0.8))
        .await
    {
        if is_cancelled(repository, task_id).await {
            info!(task_id, "task cancelled before storing results");
            return TaskOutcome::Cancelled;
        }
        error!(task_id, %err, "failed to mark task pre-store progress");
        return TaskOutcome::Failed;
    }

    if is_cancelled(repository, task_id).await {
        info!(task_id, "task cancelled before storing results");
        return TaskOutcome::Cancelled;
    }

    if let Err(err) = result_store.store(task_id, &packed).await {
        error!(task_id, %err, "failed to store results");
        fail_task(repository, task_id, "failed to store results").await;
        return TaskOutcome::Failed;
    }

    if let Err(err) = repository
        .update_status(task_id, StatusUpdate::to(TaskStatus::Completed).with_progress(1.0))
        .await
    {
        if is_cancelled(repository, task_id).await {
            info!(task_id, "task cancelled before completion was recorded");
            return TaskOutcome::Cancelled;
        }
        error!(task_id, %err, "failed to mark task completed");
        return TaskOutcome::Failed;
    }

    info!(task_id, "task completed");
    TaskOutcome::Completed
}

async fn is_cancelled<R: TaskRepository>(repository: &R, task_id: &str) -> bool {
    matches!(
        repository.get(task_id).await,
        Ok(Some(task)) if task.status == TaskStatus::Cancelled
    )
}

async fn fail_task<R: TaskRepository>(repository: &R, task_id: &str, message: &str) {
    let _ = repository
        .update_status(task_id, StatusUpdate::to(TaskStatus::Failed).with_error(message))
        .await;
}
