//! JSON error responses.
//!
//! Every failed request answers with `{"error": "..."}` and a status code
//! derived from the store failure. Storage faults are logged here and
//! replaced with a generic per-operation message.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Task not found")]
    NotFound,

    #[error("Task was modified concurrently")]
    Conflict,

    #[error("{0}")]
    Internal(&'static str),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    /// Map a store failure, using `failure` as the message for 5xx outcomes.
    pub fn from_store(err: StoreError, failure: &'static str) -> Self {
        match err {
            StoreError::Validation(e) => Self::BadRequest(e.to_string()),
            StoreError::NotFound(_) => Self::NotFound,
            StoreError::Conflict {
                id,
                expected,
                actual,
            } => {
                tracing::debug!(%id, expected, actual, "Rejected stale task update");
                Self::Conflict
            }
            StoreError::Unavailable(cause) => {
                tracing::error!("{}: {}", failure, cause);
                Self::Internal(failure)
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ValidationError;

    #[test]
    fn test_store_error_mapping() {
        let validation =
            ApiError::from_store(ValidationError::MissingRequired.into(), "Failed to create task");
        assert_eq!(validation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(validation.to_string(), "Title and due date are required");

        let missing = ApiError::from_store(
            StoreError::NotFound("abc".to_string()),
            "Failed to fetch task",
        );
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.to_string(), "Task not found");

        let conflict = ApiError::from_store(
            StoreError::Conflict {
                id: "abc".to_string(),
                expected: 1,
                actual: 2,
            },
            "Failed to update task",
        );
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_storage_failures_are_generic() {
        let err = ApiError::from_store(
            StoreError::Unavailable("disk I/O error at /var/lib/tasks.db".to_string()),
            "Failed to delete task",
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Failed to delete task");
    }
}
