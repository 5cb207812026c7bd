//! `/tasks` handlers: create, inspect, cancel, retry, list, and the
//! aggregate statistics endpoint.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::extract::{Multipart, Path as AxumPath, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use domain_tasks::{CreateTask, StoryRecord, Task, TaskRepository, TaskStatistics, TaskStatus};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;
use web_support::AppError;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_worker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl From<Task> for TaskStatusResponse {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.task_id,
            status: task.status,
            progress: task.progress,
            created_at: task.created_at,
            updated_at: task.updated_at,
            assigned_worker: task.assigned_worker,
            error_message: task.error_message,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<TaskStatus>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

/// One file pulled off the multipart body (or out of an uploaded zip),
/// still in memory and not yet written to `upload_dir`.
struct StagedFile {
    name: String,
    bytes: Vec<u8>,
}

/// Accumulated form state while walking a `POST /tasks` multipart body.
#[derive(Default)]
struct CreateTaskForm {
    staged: Vec<StagedFile>,
    story_name: Option<String>,
    source_language: Option<String>,
    target_languages: Vec<String>,
}

pub async fn create_task(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(axum::http::StatusCode, Json<TaskResponse>), AppError> {
    let mut form = CreateTaskForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(e.to_string()))?;
            if bytes.len() as u64 > state.task_settings.max_file_size_bytes {
                return Err(AppError::Validation(format!(
                    "file {file_name} exceeds maximum size limit"
                )));
            }
            form.staged.push(StagedFile {
                name: file_name,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| AppError::Validation(e.to_string()))?;
        match name.as_str() {
            "story_name" if !text.is_empty() => form.story_name = Some(text),
            "source_language" => form.source_language = Some(text),
            "target_languages" | "target_languages[]" => form.target_languages.push(text),
            _ => {}
        }
    }

    let source_language = form.source_language.unwrap_or_else(|| "en".to_string());
    let target_languages = if form.target_languages.is_empty() {
        vec!["zh".to_string(), "ja".to_string()]
    } else {
        form.target_languages
    };

    if !state.task_settings.is_language_supported(&source_language) {
        return Err(AppError::Validation(format!(
            "unsupported source language: {source_language}"
        )));
    }
    for lang in &target_languages {
        if !state.task_settings.is_language_supported(lang) {
            return Err(AppError::Validation(format!("unsupported target language: {lang}")));
        }
    }

    let mut story_name = form.story_name;
    let mut expanded = Vec::new();
    for staged in form.staged {
        if staged.name.to_lowercase().ends_with(".zip") {
            if story_name.is_none() {
                story_name = Some(zip_stem(&staged.name));
            }
            expanded.extend(extract_zip(&staged.bytes)?);
        } else {
            expanded.push(staged);
        }
    }

    tokio::fs::create_dir_all(&state.task_settings.upload_dir)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let mut audio_files = Vec::new();
    let mut text_data: HashMap<String, String> = HashMap::new();

    for file in expanded {
        let extension = Path::new(&file.name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let dest = write_upload(&state.task_settings.upload_dir, &file.name, &file.bytes)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        if state.task_settings.is_audio_format_allowed(&extension) {
            audio_files.push(dest.to_string_lossy().into_owned());
        } else if extension == "json" {
            let parsed: HashMap<String, String> = serde_json::from_slice(&file.bytes)
                .map_err(|e| AppError::Validation(format!("invalid reference text JSON: {e}")))?;
            text_data.extend(parsed);
        } else {
            warn!(file = file.name, "ignoring unrecognized upload");
        }
    }

    if audio_files.is_empty() {
        return Err(AppError::Validation(
            "no audio files found in upload".to_string(),
        ));
    }

    let input = CreateTask {
        source_language: source_language.clone(),
        target_languages: target_languages.clone(),
        audio_files,
        text_data,
        story_name: story_name.clone(),
    };
    input.validate()?;

    let task = state.repository.create(input).await?;
    state.dispatcher.create_task(task.clone()).await?;

    if let Some(name) = &story_name {
        let languages = std::iter::once(source_language.clone())
            .chain(target_languages.clone())
            .collect();
        state
            .repository
            .associate_story(
                name,
                StoryRecord {
                    task_id: task.task_id.clone(),
                    title: name.clone(),
                    languages,
                    segment_count: task.text_data.len() as u32,
                },
            )
            .await?;
    }

    maybe_sweep(&state).await;

    info!(task_id = %task.task_id, "created task");
    Ok((
        axum::http::StatusCode::CREATED,
        Json(TaskResponse {
            task_id: task.task_id,
            status: task.status,
            message: "task created successfully".to_string(),
        }),
    ))
}

fn zip_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

/// Expands a zip's top-level entries into staged in-memory files. Entry
/// names are reduced to their bare filename so a crafted `../../etc/passwd`
/// entry can't escape `upload_dir`.
fn extract_zip(bytes: &[u8]) -> Result<Vec<StagedFile>, AppError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AppError::Validation(format!("invalid zip bundle: {e}")))?;

    let mut files = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| AppError::Validation(format!("invalid zip bundle: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        let Some(enclosed) = entry.enclosed_name() else {
            continue;
        };
        let Some(name) = enclosed.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };

        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| AppError::Validation(format!("failed reading zip entry {name}: {e}")))?;
        files.push(StagedFile { name, bytes });
    }
    Ok(files)
}

async fn write_upload(upload_dir: &str, filename: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    let safe_name = Path::new(filename)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(filename));
    let dest = Path::new(upload_dir).join(safe_name);
    tokio::fs::write(&dest, bytes).await?;
    Ok(dest)
}

/// Opportunistic GC, gated so at most one sweep runs per `JANITOR_INTERVAL`
/// regardless of request volume.
async fn maybe_sweep(state: &AppState) {
    let now = Utc::now().timestamp();
    let interval = state.janitor_settings.interval_secs as i64;
    let last = state.last_sweep.load(Ordering::Relaxed);
    if now - last < interval {
        return;
    }
    if state
        .last_sweep
        .compare_exchange(last, now, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return;
    }

    let task_retention = Duration::from_secs(state.janitor_settings.task_retention_secs);
    let consumer_idle_threshold = Duration::from_millis(state.janitor_settings.consumer_idle_threshold_ms);
    match state.dispatcher.sweep(task_retention, consumer_idle_threshold).await {
        Ok(report) if report.tasks_purged > 0 || report.consumers_removed > 0 => {
            info!(
                tasks_purged = report.tasks_purged,
                consumers_removed = report.consumers_removed,
                "request-path sweep completed"
            );
        }
        Ok(_) => {}
        Err(err) => warn!(%err, "request-path sweep failed"),
    }
}

pub async fn get_task(
    State(state): State<AppState>,
    AxumPath(task_id): AxumPath<String>,
) -> Result<Json<TaskStatusResponse>, AppError> {
    let task = state
        .repository
        .get(&task_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("task {task_id}")))?;
    Ok(Json(task.into()))
}

pub async fn get_task_results(
    State(state): State<AppState>,
    AxumPath(task_id): AxumPath<String>,
) -> Result<Json<domain_results::PackedResults>, AppError> {
    let task = state
        .repository
        .get(&task_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("task {task_id}")))?;

    if task.status != TaskStatus::Completed {
        return Err(AppError::PreconditionFailed(format!(
            "task not completed, current status: {}",
            task.status
        )));
    }

    let results = state
        .result_store
        .get(&task_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("results for task {task_id}")))?;
    Ok(Json(results))
}

pub async fn cancel_task(
    State(state): State<AppState>,
    AxumPath(task_id): AxumPath<String>,
) -> Result<Json<TaskResponse>, AppError> {
    let task = state.dispatcher.cancel(&task_id).await?;
    info!(task_id = %task.task_id, "cancelled task");
    Ok(Json(TaskResponse {
        task_id: task.task_id,
        status: task.status,
        message: "task cancelled successfully".to_string(),
    }))
}

pub async fn retry_task(
    State(state): State<AppState>,
    AxumPath(task_id): AxumPath<String>,
) -> Result<Json<TaskResponse>, AppError> {
    let task = state.dispatcher.retry(&task_id).await?;
    info!(task_id = %task.task_id, "retried task");
    Ok(Json(TaskResponse {
        task_id: task.task_id,
        status: task.status,
        message: "task retried successfully".to_string(),
    }))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TaskStatusResponse>>, AppError> {
    let tasks = state.repository.list(query.status, query.limit).await?;
    Ok(Json(tasks.into_iter().map(TaskStatusResponse::from).collect()))
}

pub async fn task_statistics(State(state): State<AppState>) -> Result<Json<TaskStatistics>, AppError> {
    Ok(Json(state.repository.statistics().await?))
}
