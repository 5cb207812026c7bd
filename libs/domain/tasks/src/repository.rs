//! Redis-hash-backed persistence for [`Task`] records.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use task_store::KvStore;
use tracing::{info, instrument, warn};

use crate::error::{TaskError, TaskResult};
use crate::models::{CreateTask, StatusUpdate, StoryRecord, Task, TaskStatistics, TaskStatus};

const TASK_KEY_PREFIX: &str = "task:";
const STORY_KEY_PREFIX: &str = "story:";
const RESULT_KEY_PREFIX: &str = "results:";

fn task_key(task_id: &str) -> String {
    format!("{TASK_KEY_PREFIX}{task_id}")
}

fn story_key(name: &str) -> String {
    format!("{STORY_KEY_PREFIX}{name}")
}

/// Rejects moves out of a terminal status other than the explicit-retry
/// path (FAILED -> PENDING), so a late progress write can't clobber a
/// CANCELLED or COMPLETED task back into a running state.
fn validate_transition(current: TaskStatus, next: TaskStatus) -> TaskResult<()> {
    let is_retry = current == TaskStatus::Failed && next == TaskStatus::Pending;
    if current.is_terminal() && next != current && !is_retry {
        return Err(TaskError::InvalidTransition {
            from: current.to_string(),
            to: next.to_string(),
        });
    }
    Ok(())
}

fn result_key(task_id: &str) -> String {
    format!("{RESULT_KEY_PREFIX}{task_id}")
}

/// Persistence for task records. Implementations can back this with Redis
/// hashes (the only implementation today) or an in-memory fake for tests.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, input: CreateTask) -> TaskResult<Task>;
    async fn get(&self, task_id: &str) -> TaskResult<Option<Task>>;
    async fn update_status(&self, task_id: &str, update: StatusUpdate) -> TaskResult<Task>;
    async fn list(&self, status: Option<TaskStatus>, limit: usize) -> TaskResult<Vec<Task>>;
    async fn statistics(&self) -> TaskResult<TaskStatistics>;
    /// Deletes terminal-state tasks (and their result blob) last touched
    /// before `cutoff`. Returns the number removed.
    async fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> TaskResult<usize>;
    async fn associate_story(&self, story_name: &str, record: StoryRecord) -> TaskResult<()>;
    async fn get_story(&self, story_name: &str) -> TaskResult<Option<StoryRecord>>;
}

pub struct RedisTaskRepository {
    kv: KvStore,
}

impl RedisTaskRepository {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    fn serialize(task: &Task) -> TaskResult<Vec<(String, String)>> {
        Ok(vec![
            ("task_id".into(), task.task_id.clone()),
            ("status".into(), task.status.as_str().into()),
            ("source_language".into(), task.source_language.clone()),
            (
                "target_languages".into(),
                serde_json::to_string(&task.target_languages)?,
            ),
            ("audio_files".into(), serde_json::to_string(&task.audio_files)?),
            ("text_data".into(), serde_json::to_string(&task.text_data)?),
            ("created_at".into(), task.created_at.to_rfc3339()),
            ("updated_at".into(), task.updated_at.to_rfc3339()),
            (
                "assigned_worker".into(),
                task.assigned_worker.clone().unwrap_or_default(),
            ),
            (
                "error_message".into(),
                task.error_message.clone().unwrap_or_default(),
            ),
            ("retry_count".into(), task.retry_count.to_string()),
            ("progress".into(), task.progress.to_string()),
            (
                "story_name".into(),
                task.story_name.clone().unwrap_or_default(),
            ),
        ])
    }

    fn deserialize(task_id: &str, fields: &HashMap<String, String>) -> TaskResult<Task> {
        let status = fields
            .get("status")
            .ok_or_else(|| TaskError::Validation(format!("task {task_id} missing status")))?
            .parse::<TaskStatus>()
            .map_err(TaskError::Validation)?;

        let created_at = fields
            .get("created_at")
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| TaskError::Validation(format!("task {task_id} missing created_at")))?;

        let updated_at = fields
            .get("updated_at")
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(created_at);

        let target_languages = fields
            .get("target_languages")
            .map(|v| serde_json::from_str(v))
            .transpose()?
            .unwrap_or_default();

        let audio_files = fields
            .get("audio_files")
            .map(|v| serde_json::from_str(v))
            .transpose()?
            .unwrap_or_default();

        let text_data = fields
            .get("text_data")
            .map(|v| serde_json::from_str(v))
            .transpose()?
            .unwrap_or_default();

        let assigned_worker = fields
            .get("assigned_worker")
            .filter(|v| !v.is_empty())
            .cloned();
        let error_message = fields
            .get("error_message")
            .filter(|v| !v.is_empty())
            .cloned();
        let story_name = fields.get("story_name").filter(|v| !v.is_empty()).cloned();

        let retry_count = fields
            .get("retry_count")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let progress = fields
            .get("progress")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0);

        Ok(Task {
            task_id: task_id.to_string(),
            status,
            source_language: fields.get("source_language").cloned().unwrap_or_default(),
            target_languages,
            audio_files,
            text_data,
            created_at,
            updated_at,
            assigned_worker,
            error_message,
            retry_count,
            progress,
            story_name,
        })
    }
}

#[async_trait]
impl TaskRepository for RedisTaskRepository {
    #[instrument(skip(self, input), fields(source = %input.source_language))]
    async fn create(&self, input: CreateTask) -> TaskResult<Task> {
        let task_id = uuid::Uuid::new_v4().to_string();
        let task = Task::new(
            task_id.clone(),
            input.source_language,
            input.target_languages,
            input.audio_files,
            input.text_data,
            input.story_name,
        );

        let fields = Self::serialize(&task)?;
        let borrowed: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.kv.hset_many(&task_key(&task_id), &borrowed).await?;

        info!(task_id = %task_id, "created task");
        Ok(task)
    }

    async fn get(&self, task_id: &str) -> TaskResult<Option<Task>> {
        let fields = self.kv.hgetall(&task_key(task_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::deserialize(task_id, &fields)?))
    }

    #[instrument(skip(self, update), fields(task_id = %task_id))]
    async fn update_status(&self, task_id: &str, update: StatusUpdate) -> TaskResult<Task> {
        let mut task = self
            .get(task_id)
            .await?
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))?;

        validate_transition(task.status, update.status)?;

        task.status = update.status;
        task.updated_at = Utc::now();
        if let Some(worker) = update.assigned_worker {
            task.assigned_worker = worker;
        }
        if let Some(error) = update.error_message {
            task.error_message = error;
        }
        if let Some(progress) = update.progress {
            task.progress = progress;
        }
        if let Some(retry_count) = update.retry_count {
            task.retry_count = retry_count;
        }

        let fields = Self::serialize(&task)?;
        let borrowed: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.kv.hset_many(&task_key(task_id), &borrowed).await?;

        info!(status = %task.status, "updated task status");
        Ok(task)
    }

    async fn list(&self, status: Option<TaskStatus>, limit: usize) -> TaskResult<Vec<Task>> {
        let keys = self.kv.scan_keys(&format!("{TASK_KEY_PREFIX}*")).await?;
        let mut tasks = Vec::new();
        for key in keys {
            if tasks.len() >= limit {
                break;
            }
            let Some(task_id) = key.strip_prefix(TASK_KEY_PREFIX) else {
                continue;
            };
            let fields = self.kv.hgetall(&key).await?;
            if fields.is_empty() {
                continue;
            }
            match Self::deserialize(task_id, &fields) {
                Ok(task) => {
                    if status.map(|s| s == task.status).unwrap_or(true) {
                        tasks.push(task);
                    }
                }
                Err(err) => warn!(task_id, %err, "skipping corrupt task record"),
            }
        }
        Ok(tasks)
    }

    async fn statistics(&self) -> TaskResult<TaskStatistics> {
        let keys = self.kv.scan_keys(&format!("{TASK_KEY_PREFIX}*")).await?;
        let mut stats = TaskStatistics::default();
        for key in keys {
            let fields = self.kv.hgetall(&key).await?;
            let Some(status) = fields.get("status").and_then(|v| v.parse::<TaskStatus>().ok())
            else {
                continue;
            };
            stats.total += 1;
            match status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Processing => stats.processing += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Cancelled => stats.cancelled += 1,
                TaskStatus::Retry => stats.retry += 1,
            }
        }
        Ok(stats)
    }

    async fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> TaskResult<usize> {
        let keys = self.kv.scan_keys(&format!("{TASK_KEY_PREFIX}*")).await?;
        let mut cleaned = 0;
        for key in keys {
            let Some(task_id) = key.strip_prefix(TASK_KEY_PREFIX) else {
                continue;
            };
            let fields = self.kv.hgetall(&key).await?;
            let Some(task) = (if fields.is_empty() {
                None
            } else {
                Self::deserialize(task_id, &fields).ok()
            }) else {
                continue;
            };

            if task.status.is_terminal() && task.updated_at < cutoff {
                self.kv.delete(&key).await?;
                self.kv.delete(&result_key(task_id)).await?;
                cleaned += 1;
            }
        }
        info!(cleaned, "cleaned up old tasks");
        Ok(cleaned)
    }

    async fn associate_story(&self, story_name: &str, record: StoryRecord) -> TaskResult<()> {
        let languages = serde_json::to_string(&record.languages)?;
        let segment_count = record.segment_count.to_string();
        let fields = [
            ("task_id", record.task_id.as_str()),
            ("title", record.title.as_str()),
            ("languages", languages.as_str()),
            ("segment_count", segment_count.as_str()),
        ];
        self.kv.hset_many(&story_key(story_name), &fields).await?;
        info!(story_name, task_id = %record.task_id, "associated story with task");
        Ok(())
    }

    async fn get_story(&self, story_name: &str) -> TaskResult<Option<StoryRecord>> {
        let fields = self.kv.hgetall(&story_key(story_name)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let task_id = fields
            .get("task_id")
            .cloned()
            .ok_or_else(|| TaskError::Validation(format!("story {story_name} missing task_id")))?;
        let title = fields.get("title").cloned().unwrap_or_default();
        let languages = fields
            .get("languages")
            .map(|v| serde_json::from_str(v))
            .transpose()?
            .unwrap_or_default();
        let segment_count = fields
            .get("segment_count")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Ok(Some(StoryRecord {
            task_id,
            title,
            languages,
            segment_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;
    use std::collections::HashMap;

    #[test]
    fn test_serialize_deserialize_round_trip() {
        let mut text_data = HashMap::new();
        text_data.insert("a".to_string(), "hello there".to_string());

        let mut task = Task::new(
            "task-1".into(),
            "en".into(),
            vec!["zh".into(), "ja".into()],
            vec!["a.mp3".into()],
            text_data,
            Some("tilly".into()),
        );
        task.assigned_worker = Some("worker-1".into());
        task.retry_count = 2;
        task.progress = 0.8;

        let fields = RedisTaskRepository::serialize(&task).unwrap();
        let map: HashMap<String, String> = fields.into_iter().collect();
        let restored = RedisTaskRepository::deserialize("task-1", &map).unwrap();

        assert_eq!(restored.task_id, task.task_id);
        assert_eq!(restored.source_language, task.source_language);
        assert_eq!(restored.target_languages, task.target_languages);
        assert_eq!(restored.audio_files, task.audio_files);
        assert_eq!(restored.text_data, task.text_data);
        assert_eq!(restored.assigned_worker, task.assigned_worker);
        assert_eq!(restored.retry_count, task.retry_count);
        assert_eq!(restored.progress, task.progress);
        assert_eq!(restored.story_name, task.story_name);
    }

    #[test]
    fn test_deserialize_missing_optional_fields_defaults_to_none() {
        let mut map = HashMap::new();
        map.insert("status".to_string(), "pending".to_string());
        map.insert("created_at".to_string(), Utc::now().to_rfc3339());
        map.insert("source_language".to_string(), "en".to_string());

        let task = RedisTaskRepository::deserialize("task-2", &map).unwrap();
        assert!(task.assigned_worker.is_none());
        assert!(task.error_message.is_none());
        assert!(task.story_name.is_none());
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.progress, 0.0);
    }

    #[test]
    fn test_terminal_status_rejects_further_transitions() {
        assert!(validate_transition(TaskStatus::Cancelled, TaskStatus::Processing).is_err());
        assert!(validate_transition(TaskStatus::Completed, TaskStatus::Processing).is_err());
        assert!(validate_transition(TaskStatus::Failed, TaskStatus::Processing).is_err());
    }

    #[test]
    fn test_failed_to_pending_is_the_retry_exception() {
        assert!(validate_transition(TaskStatus::Failed, TaskStatus::Pending).is_ok());
    }

    #[test]
    fn test_non_terminal_transitions_are_unrestricted() {
        assert!(validate_transition(TaskStatus::Pending, TaskStatus::Processing).is_ok());
        assert!(validate_transition(TaskStatus::Processing, TaskStatus::Completed).is_ok());
        assert!(validate_transition(TaskStatus::Processing, TaskStatus::Processing).is_ok());
    }
}
