//! Stream-backed dispatch: the state machine described by the translation
//! task lifecycle, layered on top of [`task_store::StreamStore`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use task_store::StreamStore;
use tracing::{info, warn};

use crate::error::{TaskError, TaskResult};
use crate::models::{StatusUpdate, Task, TaskStatus};
use crate::repository::TaskRepository;

pub const STREAM_NAME: &str = "translation_tasks";
pub const GROUP_NAME: &str = "translation_workers";

/// A claimed unit of work: the stream entry id (for acking) paired with the
/// task it refers to.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub entry_id: String,
    pub task: Task,
}

pub struct Dispatcher<R: TaskRepository> {
    stream: StreamStore,
    repository: Arc<R>,
    retry_limit: u32,
}

impl<R: TaskRepository> Dispatcher<R> {
    /// Bootstraps the consumer group (idempotent) and returns a dispatcher
    /// bound to the shared `translation_tasks` stream.
    pub async fn new(stream: StreamStore, repository: Arc<R>, retry_limit: u32) -> TaskResult<Self> {
        stream.ensure_group(STREAM_NAME, GROUP_NAME).await?;
        info!(stream = STREAM_NAME, group = GROUP_NAME, "dispatcher stream ready");
        Ok(Self {
            stream,
            repository,
            retry_limit,
        })
    }

    /// Reclaims every entry still pending under `consumer` from a previous
    /// run of the same identity, so a restarted worker doesn't wait out
    /// `worker_timeout` to recover its own in-flight claims.
    pub async fn reclaim_own_pending_on_startup(&self, consumer: &str) -> TaskResult<usize> {
        let mut total = 0;
        let mut start_id = "0-0".to_string();

        loop {
            let (next_id, entries) = self
                .stream
                .claim(STREAM_NAME, GROUP_NAME, consumer, 0, &start_id, 100)
                .await?;

            if entries.is_empty() {
                break;
            }
            total += entries.len();
            if next_id == "0-0" {
                break;
            }
            start_id = next_id;
        }

        if total > 0 {
            info!(count = total, consumer, "reclaimed own pending entries on startup");
        }
        Ok(total)
    }

    pub async fn create_task(&self, task: Task) -> TaskResult<String> {
        let task_id = task.task_id.clone();
        self.stream
            .add(
                STREAM_NAME,
                &[
                    ("task_id", task_id.as_str()),
                    ("status", task.status.as_str()),
                    ("timestamp", &Utc::now().timestamp().to_string()),
                ],
            )
            .await?;
        info!(task_id, "enqueued task");
        Ok(task_id)
    }

    /// Reads up to `count` fresh entries for `worker`, transitioning each
    /// underlying PENDING task to PROCESSING. Entries whose task is missing
    /// or no longer PENDING are ACKed and discarded without being returned.
    pub async fn claim_pending(&self, worker: &str, count: usize) -> TaskResult<Vec<ClaimedTask>> {
        let entries = self
            .stream
            .read_new(STREAM_NAME, GROUP_NAME, worker, count, Some(1000))
            .await?;

        let mut claimed = Vec::new();
        for entry in entries {
            let Some(task_id) = entry.fields.get("task_id").cloned() else {
                warn!(entry_id = %entry.id, "stream entry missing task_id, acking");
                self.stream.ack(STREAM_NAME, GROUP_NAME, &entry.id).await?;
                continue;
            };

            let task = self.repository.get(&task_id).await?;
            match task {
                Some(task) if task.status == TaskStatus::Pending => {
                    let updated = self
                        .repository
                        .update_status(
                            &task_id,
                            StatusUpdate::to(TaskStatus::Processing)
                                .with_worker(worker)
                                .with_progress(0.1),
                        )
                        .await?;
                    claimed.push(ClaimedTask {
                        entry_id: entry.id,
                        task: updated,
                    });
                }
                _ => {
                    warn!(task_id, entry_id = %entry.id, "poison entry, acking without effect");
                    self.stream.ack(STREAM_NAME, GROUP_NAME, &entry.id).await?;
                }
            }
        }
        Ok(claimed)
    }

    /// Claims entries idle past `worker_timeout` and resets their tasks back
    /// to PENDING for redelivery. Does not increment `retry_count`.
    pub async fn claim_orphaned(
        &self,
        worker: &str,
        worker_timeout: Duration,
    ) -> TaskResult<Vec<ClaimedTask>> {
        let min_idle_ms = worker_timeout.as_millis() as u64;
        let (_, entries) = self
            .stream
            .claim(STREAM_NAME, GROUP_NAME, worker, min_idle_ms, "0-0", 100)
            .await?;

        let mut reclaimed = Vec::new();
        for entry in entries {
            let Some(task_id) = entry.fields.get("task_id").cloned() else {
                warn!(entry_id = %entry.id, "orphaned entry missing task_id, acking");
                self.stream.ack(STREAM_NAME, GROUP_NAME, &entry.id).await?;
                continue;
            };

            match self.repository.get(&task_id).await? {
                Some(task) if task.status == TaskStatus::Processing => {
                    let updated = self
                        .repository
                        .update_status(&task_id, StatusUpdate::to(TaskStatus::Pending).with_progress(0.0))
                        .await?;
                    info!(task_id, entry_id = %entry.id, "claimed orphaned task");
                    reclaimed.push(ClaimedTask {
                        entry_id: entry.id,
                        task: updated,
                    });
                }
                _ => {
                    warn!(task_id, entry_id = %entry.id, "orphaned entry's task is gone or no longer processing, acking");
                    self.stream.ack(STREAM_NAME, GROUP_NAME, &entry.id).await?;
                }
            }
        }
        Ok(reclaimed)
    }

    pub async fn acknowledge(&self, entry_id: &str) -> TaskResult<()> {
        self.stream.ack(STREAM_NAME, GROUP_NAME, entry_id).await?;
        Ok(())
    }

    /// Transitions a FAILED task back to PENDING, bumping `retry_count`, and
    /// enqueues a fresh stream entry. Rejects tasks that aren't FAILED or
    /// that have exhausted the retry limit.
    pub async fn retry(&self, task_id: &str) -> TaskResult<Task> {
        let task = self
            .repository
            .get(task_id)
            .await?
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

        if task.status != TaskStatus::Failed {
            return Err(TaskError::InvalidTransition {
                from: task.status.to_string(),
                to: TaskStatus::Pending.to_string(),
            });
        }
        if task.retry_count >= self.retry_limit {
            return Err(TaskError::RetryLimitExceeded {
                retry_count: task.retry_count,
                limit: self.retry_limit,
            });
        }

        let new_retry_count = task.retry_count + 1;
        let updated = self
            .repository
            .update_status(
                task_id,
                StatusUpdate::to(TaskStatus::Pending)
                    .with_progress(0.0)
                    .clear_error()
                    .with_retry_count(new_retry_count),
            )
            .await?;

        self.stream
            .add(
                STREAM_NAME,
                &[
                    ("task_id", task_id),
                    ("status", TaskStatus::Pending.as_str()),
                    ("retry_count", &new_retry_count.to_string()),
                    ("timestamp", &Utc::now().timestamp().to_string()),
                ],
            )
            .await?;

        info!(task_id, retry_count = new_retry_count, "retried task");
        Ok(updated)
    }

    /// Sets a task to CANCELLED. Cooperative: a running worker observes this
    /// between pipeline stages and aborts on its own.
    pub async fn cancel(&self, task_id: &str) -> TaskResult<Task> {
        let task = self
            .repository
            .get(task_id)
            .await?
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

        if task.status.is_terminal() {
            return Err(TaskError::InvalidTransition {
                from: task.status.to_string(),
                to: TaskStatus::Cancelled.to_string(),
            });
        }

        self.repository
            .update_status(task_id, StatusUpdate::to(TaskStatus::Cancelled))
            .await
    }

    /// Purges terminal tasks last touched before `task_retention` ago and
    /// drops consumers that have been idle past `consumer_idle_threshold`.
    /// Shared by the standalone janitor's interval loop and the request-path
    /// sweep gated off `create_task`; safe to call concurrently from both.
    pub async fn sweep(
        &self,
        task_retention: Duration,
        consumer_idle_threshold: Duration,
    ) -> TaskResult<SweepReport> {
        let retention = chrono::Duration::from_std(task_retention).unwrap_or(chrono::Duration::zero());
        let cutoff = Utc::now() - retention;
        let tasks_purged = self.repository.cleanup_older_than(cutoff).await?;

        let idle_threshold_ms = consumer_idle_threshold.as_millis() as u64;
        let consumers = self.stream.consumers(STREAM_NAME, GROUP_NAME).await?;
        let mut consumers_removed = 0;
        for consumer in consumers {
            if consumer.idle_ms > idle_threshold_ms {
                self.stream.delete_consumer(STREAM_NAME, GROUP_NAME, &consumer.name).await?;
                info!(consumer = consumer.name, idle_ms = consumer.idle_ms, "removed dead consumer");
                consumers_removed += 1;
            }
        }

        if tasks_purged > 0 || consumers_removed > 0 {
            info!(tasks_purged, consumers_removed, "janitor sweep completed");
        }

        Ok(SweepReport {
            tasks_purged,
            consumers_removed,
        })
    }
}

/// Outcome of a single [`Dispatcher::sweep`] pass.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub tasks_purged: usize,
    pub consumers_removed: usize,
}
