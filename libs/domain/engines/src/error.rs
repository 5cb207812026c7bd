use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("translation failed: {0}")]
    Translation(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
