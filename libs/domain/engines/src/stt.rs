use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

/// Raw speech-to-text output: the flattened transcription plus whatever
/// timestamped segments the underlying model produced. Stored verbatim as
/// the `AUDIO` entry of a packed result.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Transcription {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<serde_json::Value>,
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait SttEngine: Send + Sync {
    async fn transcribe(&self, audio_path: &str) -> EngineResult<Transcription>;
}

/// A deterministic stand-in used in tests and local runs without real model
/// weights: echoes the file stem back as the transcript.
pub struct EchoSttEngine;

#[async_trait]
impl SttEngine for EchoSttEngine {
    async fn transcribe(&self, audio_path: &str) -> EngineResult<Transcription> {
        let stem = std::path::Path::new(audio_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(audio_path)
            .to_string();

        Ok(Transcription {
            text: stem,
            segments: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_engine_returns_file_stem() {
        let engine = EchoSttEngine;
        let result = engine.transcribe("/tmp/uploads/hello.mp3").await.unwrap();
        assert_eq!(result.text, "hello");
        assert!(result.segments.is_empty());
    }
}
