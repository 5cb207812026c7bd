//! Uniform application error type and its HTTP mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

/// Standard error envelope returned for every non-2xx response.
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error identifier, stable across releases.
    pub error: String,
    /// Human-readable message, safe to show to a caller.
    pub message: String,
    /// Optional structured detail (e.g. validation field errors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error, one variant per kind in the error handling design.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::PreconditionFailed(_) => (StatusCode::BAD_REQUEST, "PRECONDITION_FAILED"),
            Self::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            Self::Engine(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ENGINE_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let body = ErrorResponse {
            error: error.to_string(),
            message: self.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(e: ValidationErrors) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        Self::Validation(e.body_text())
    }
}

impl From<task_store::StoreError> for AppError {
    fn from(e: task_store::StoreError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<domain_tasks::TaskError> for AppError {
    fn from(e: domain_tasks::TaskError) -> Self {
        use domain_tasks::TaskError::*;
        match e {
            NotFound(id) => Self::NotFound(format!("task {id}")),
            StoryNotFound(name) => Self::NotFound(format!("story {name}")),
            Validation(msg) => Self::Validation(msg),
            InvalidTransition { from, to } => {
                Self::PreconditionFailed(format!("cannot transition from {from} to {to}"))
            }
            RetryLimitExceeded { retry_count, limit } => Self::PreconditionFailed(format!(
                "retry limit exceeded ({retry_count}/{limit})"
            )),
            Store(err) => Self::Store(err.to_string()),
            Serialization(err) => Self::Internal(err.to_string()),
        }
    }
}

impl From<domain_results::ResultError> for AppError {
    fn from(e: domain_results::ResultError) -> Self {
        use domain_results::ResultError::*;
        match e {
            Store(err) => Self::Store(err.to_string()),
            Serialization(err) => Self::Internal(err.to_string()),
            Io(err) => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let err = AppError::NotFound("task".to_string());
        assert_eq!(err.parts().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_store_error_maps_to_500() {
        let err = AppError::Store("connection refused".to_string());
        assert_eq!(err.parts().0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
