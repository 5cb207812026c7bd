use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Engine(#[from] domain_engines::EngineError),

    #[error(transparent)]
    Task(#[from] domain_tasks::TaskError),

    #[error(transparent)]
    Result(#[from] domain_results::ResultError),

    #[error("malformed engine payload: {0}")]
    Serialization(#[from] serde_json::Error),
}
