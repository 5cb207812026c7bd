//! Error types for the key-value and stream store.

use thiserror::Error;

/// Errors that can occur against the backing store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("consumer group error: {0}")]
    ConsumerGroup(String),

    #[error("entry parsing error: {0}")]
    EntryParsing(String),

    #[error("health check failed: {0}")]
    HealthCheck(String),
}

impl StoreError {
    /// Whether this error is a recoverable connection problem, worth
    /// retrying rather than surfacing to the caller immediately.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Redis(e) => {
                let s = e.to_string().to_lowercase();
                s.contains("connection")
                    || s.contains("disconnected")
                    || s.contains("broken pipe")
                    || s.contains("reset by peer")
                    || s.contains("refused")
                    || s.contains("eof")
            }
            _ => false,
        }
    }

    /// Whether this error indicates the consumer group is missing (NOGROUP),
    /// meaning it needs to be (re)created before retrying.
    pub fn is_nogroup_error(&self) -> bool {
        match self {
            Self::Redis(e) => e.to_string().contains("NOGROUP"),
            Self::ConsumerGroup(s) => s.contains("NOGROUP"),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = StoreError::EntryParsing("missing field".to_string());
        assert_eq!(err.to_string(), "entry parsing error: missing field");
    }
}
