use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResultError {
    #[error(transparent)]
    Store(#[from] task_store::StoreError),

    #[error("malformed result record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("result filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ResultResult<T> = Result<T, ResultError>;
