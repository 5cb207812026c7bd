use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One file's worth of packed output under a single language. `text` and
/// `audio` are only populated for the source-language entry of a file;
/// every target language carries `translation`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ResultEntry {
    #[serde(rename = "TEXT", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "AUDIO", skip_serializing_if = "Option::is_none")]
    pub audio: Option<serde_json::Value>,
    #[serde(rename = "TRANSLATION", skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

/// `{lang_code: {file_id: ResultEntry}}`.
pub type PackedResults = HashMap<String, HashMap<String, ResultEntry>>;

/// On-disk envelope written to `${result_dir}/task_{id}_{timestamp}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedResults {
    pub task_id: String,
    pub exported_at: DateTime<Utc>,
    pub data: PackedResults,
}

/// Looks up a single piece of content from a packed result, as used by
/// `GET /story/{name}/text`. `TEXT`/`TRANSLATION` are plain strings;
/// `AUDIO` carries the raw STT transcription object, so the return type
/// has to be a `Value` rather than a borrowed `&str`.
pub fn lookup_text(
    packed: &PackedResults,
    lang: &str,
    text_id: &str,
    source: &str,
) -> Option<serde_json::Value> {
    let entry = packed.get(lang)?.get(text_id)?;
    match source {
        "TEXT" => entry.text.clone().map(serde_json::Value::String),
        "TRANSLATION" => entry.translation.clone().map(serde_json::Value::String),
        "AUDIO" => entry.audio.clone(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_text_finds_translation() {
        let mut packed: PackedResults = HashMap::new();
        let mut file_map = HashMap::new();
        file_map.insert(
            "segment_1".to_string(),
            ResultEntry {
                translation: Some("你好".to_string()),
                ..Default::default()
            },
        );
        packed.insert("zh".to_string(), file_map);

        assert_eq!(
            lookup_text(&packed, "zh", "segment_1", "TRANSLATION"),
            Some(serde_json::Value::String("你好".to_string()))
        );
        assert_eq!(lookup_text(&packed, "zh", "segment_1", "TEXT"), None);
        assert_eq!(lookup_text(&packed, "en", "segment_1", "TEXT"), None);
    }

    #[test]
    fn test_lookup_text_returns_audio_as_json_object() {
        let mut packed: PackedResults = HashMap::new();
        let mut file_map = HashMap::new();
        file_map.insert(
            "segment_1".to_string(),
            ResultEntry {
                audio: Some(serde_json::json!({"text": "hello", "segments": []})),
                ..Default::default()
            },
        );
        packed.insert("en".to_string(), file_map);

        assert_eq!(
            lookup_text(&packed, "en", "segment_1", "AUDIO"),
            Some(serde_json::json!({"text": "hello", "segments": []}))
        );
    }
}
