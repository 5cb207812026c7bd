//! Per-task transcription + translation pipeline. Pure with respect to the
//! store: takes a task and engine handles, returns the packed result the
//! caller is responsible for persisting and for reacting to.

use std::path::Path;

use domain_engines::{validate_hypothesis, MtEngine, SttEngine, WerCalculator};
use domain_results::{PackedResults, ResultEntry};
use domain_tasks::Task;
use tracing::info;

use crate::error::WorkerError;

fn file_id_of(audio_file: &str) -> String {
    Path::new(audio_file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(audio_file)
        .to_string()
}

/// Runs STT, WER validation and translation for every audio file in `task`,
/// assembling the packed layout: the source language entry for a file
/// carries the original reference text and the raw STT payload; every
/// target language carries the translation of the (possibly WER-corrected)
/// text.
pub async fn process_task(
    task: &Task,
    stt: &dyn SttEngine,
    mt: &dyn MtEngine,
    wer: &dyn WerCalculator,
    wer_threshold: f32,
) -> Result<PackedResults, WorkerError> {
    let mut packed: PackedResults = PackedResults::new();

    for audio_file in &task.audio_files {
        let file_id = file_id_of(audio_file);
        let reference_text = task.text_data.get(&file_id).cloned().unwrap_or_default();

        let transcription = stt
            .transcribe(audio_file)
            .await
            .map_err(WorkerError::Engine)?;

        let validated_text =
            validate_hypothesis(wer, &reference_text, &transcription.text, wer_threshold);

        let mut translations = Vec::with_capacity(task.target_languages.len());
        for target in &task.target_languages {
            let translated = mt
                .translate(&validated_text, &task.source_language, target)
                .await
                .map_err(WorkerError::Engine)?;
            translations.push((target.clone(), translated));
        }

        let source_entry = packed
            .entry(task.source_language.clone())
            .or_default()
            .entry(file_id.clone())
            .or_default();
        source_entry.text = Some(reference_text);
        source_entry.audio = Some(serde_json::to_value(&transcription)?);

        for (target, translated) in translations {
            let entry: &mut ResultEntry = packed
                .entry(target)
                .or_default()
                .entry(file_id.clone())
                .or_default();
            entry.translation = Some(translated);
        }

        info!(task_id = %task.task_id, file_id, "processed audio file");
    }

    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_engines::{EchoSttEngine, LevenshteinWer, TaggingMtEngine};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_process_task_assembles_packed_layout() {
        let mut text_data = HashMap::new();
        text_data.insert("hello".to_string(), "hello world".to_string());

        let task = Task::new(
            "task-1".into(),
            "en".into(),
            vec!["zh".into()],
            vec!["uploads/hello.mp3".into()],
            text_data,
            None,
        );

        let packed = process_task(&task, &EchoSttEngine, &TaggingMtEngine, &LevenshteinWer, 0.3)
            .await
            .unwrap();

        let source = &packed["en"]["hello"];
        assert_eq!(source.text.as_deref(), Some("hello world"));
        assert!(source.audio.is_some());
        assert!(source.translation.is_none());

        let target = &packed["zh"]["hello"];
        assert_eq!(target.translation.as_deref(), Some("[zh] hello world"));
    }
}
