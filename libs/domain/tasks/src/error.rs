use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("retry limit exceeded: {retry_count} >= {limit}")]
    RetryLimitExceeded { retry_count: u32, limit: u32 },

    #[error("story not found: {0}")]
    StoryNotFound(String),

    #[error(transparent)]
    Store(#[from] task_store::StoreError),

    #[error("malformed task record: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type TaskResult<T> = Result<T, TaskError>;
