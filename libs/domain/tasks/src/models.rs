use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Task lifecycle state, see the dispatcher's transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Retry,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Retry => "retry",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            "retry" => Ok(TaskStatus::Retry),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// A translation task tracked across its lifetime in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub status: TaskStatus,
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub audio_files: Vec<String>,
    /// Reference text keyed by file id, possibly empty.
    pub text_data: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_worker: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub progress: f32,
    pub story_name: Option<String>,
}

impl Task {
    pub fn new(
        task_id: String,
        source_language: String,
        target_languages: Vec<String>,
        audio_files: Vec<String>,
        text_data: HashMap<String, String>,
        story_name: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            status: TaskStatus::Pending,
            source_language,
            target_languages,
            audio_files,
            text_data,
            created_at: now,
            updated_at: now,
            assigned_worker: None,
            error_message: None,
            retry_count: 0,
            progress: 0.0,
            story_name,
        }
    }
}

/// Input accepted by `POST /tasks` once the multipart body has been parsed
/// into a normalized shape by the API layer.
#[derive(Debug, Clone, Validate)]
pub struct CreateTask {
    #[validate(length(min = 1))]
    pub source_language: String,
    #[validate(length(min = 1))]
    pub target_languages: Vec<String>,
    #[validate(length(min = 1))]
    pub audio_files: Vec<String>,
    pub text_data: HashMap<String, String>,
    pub story_name: Option<String>,
}

/// Mutation accepted by `Repository::update_status`; unset fields are left
/// untouched on the stored record.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub status: TaskStatus,
    pub assigned_worker: Option<Option<String>>,
    pub error_message: Option<Option<String>>,
    pub progress: Option<f32>,
    pub retry_count: Option<u32>,
}

impl StatusUpdate {
    pub fn to(status: TaskStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_progress(mut self, progress: f32) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_worker(mut self, worker: impl Into<String>) -> Self {
        self.assigned_worker = Some(Some(worker.into()));
        self
    }

    pub fn clear_worker(mut self) -> Self {
        self.assigned_worker = Some(None);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(Some(message.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error_message = Some(None);
        self
    }

    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = Some(count);
        self
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

/// Aggregate counts backing `GET /tasks/statistics/summary`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskStatistics {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub retry: usize,
}

/// `story:{name}` lookup record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryRecord {
    pub task_id: String,
    pub title: String,
    pub languages: Vec<String>,
    pub segment_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
            TaskStatus::Retry,
        ] {
            let parsed: TaskStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(!TaskStatus::Retry.is_terminal());
    }

    #[test]
    fn test_new_task_starts_pending_with_zero_progress() {
        let task = Task::new(
            "abc".into(),
            "en".into(),
            vec!["zh".into()],
            vec!["a.mp3".into()],
            HashMap::new(),
            None,
        );
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.progress, 0.0);
    }
}
