//! `/story/{name}/text` — a friendlier lookup over packed results that
//! doesn't require the caller to know the underlying task id.

use axum::extract::{Path, Query, State};
use axum::Json;
use domain_results::lookup_text;
use domain_tasks::TaskRepository;
use serde::{Deserialize, Serialize};
use web_support::AppError;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StoryTextQuery {
    pub lang: String,
    pub text_id: String,
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct StoryTextResponse {
    pub content: serde_json::Value,
}

pub async fn get_story_text(
    State(state): State<AppState>,
    Path(story_name): Path<String>,
    Query(query): Query<StoryTextQuery>,
) -> Result<Json<StoryTextResponse>, AppError> {
    let story = state
        .repository
        .get_story(&story_name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("story {story_name}")))?;

    let packed = state
        .result_store
        .get(&story.task_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("results for task {}", story.task_id)))?;

    let content = lookup_text(&packed, &query.lang, &query.text_id, &query.source).ok_or_else(|| {
        AppError::NotFound(format!(
            "content for lang='{}', text_id='{}', source='{}'",
            query.lang, query.text_id, query.source
        ))
    })?;

    Ok(Json(StoryTextResponse { content }))
}
