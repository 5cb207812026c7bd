use async_trait::async_trait;

use crate::error::EngineResult;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait MtEngine: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> EngineResult<String>;
}

/// A deterministic stand-in used in tests and local runs without a real
/// translation API key: tags the source text with the target language
/// rather than performing any actual translation.
pub struct TaggingMtEngine;

#[async_trait]
impl MtEngine for TaggingMtEngine {
    async fn translate(&self, text: &str, _source: &str, target: &str) -> EngineResult<String> {
        Ok(format!("[{target}] {text}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tagging_engine_tags_target_language() {
        let engine = TaggingMtEngine;
        let result = engine.translate("hello", "en", "zh").await.unwrap();
        assert_eq!(result, "[zh] hello");
    }
}
