//! Task API endpoints.
//!
//! - List tasks
//! - Create task
//! - Get task
//! - Update task (partial merge)
//! - Delete task

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::routes::AppState;
use crate::task::{NewTask, Task, TaskPatch, TaskSort};

/// Create task routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/:id", get(get_task).put(update_task).delete(delete_task))
}

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    /// `dueDate` or `createdAt`; falls back to the configured default
    pub sort: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/tasks - List all tasks.
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListTasksQuery>, QueryRejection>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let Query(query) = query?;
    let sort = match query.sort.as_deref() {
        Some(raw) => raw
            .parse::<TaskSort>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => state.config.default_sort,
    };

    let tasks = state
        .store
        .list(sort)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to fetch tasks"))?;

    Ok(Json(tasks))
}

/// POST /api/tasks - Create a new task.
async fn create_task(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let Json(req) = payload?;

    let task = state
        .store
        .create(req)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to create task"))?;

    tracing::info!("Created task: {} ({})", task.title, task.id);

    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/tasks/:id - Get task details.
async fn get_task(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Task>, ApiError> {
    let Path(id) = path?;
    state
        .store
        .get(&id)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_store(e, "Failed to fetch task"))
}

/// PUT /api/tasks/:id - Update a task.
async fn update_task(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Path(id) = path?;
    let Json(patch) = payload?;

    let updated = state
        .store
        .update(&id, patch)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to update task"))?;

    tracing::info!(
        completed = updated.completed,
        version = updated.version,
        "Updated task: {} ({})",
        updated.title,
        id
    );

    Ok(Json(updated))
}

/// DELETE /api/tasks/:id - Delete a task.
async fn delete_task(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(id) = path?;
    state
        .store
        .delete(&id)
        .await
        .map_err(|e| ApiError::from_store(e, "Failed to delete task"))?;

    tracing::info!("Deleted task {}", id);

    Ok(Json(MessageResponse {
        message: "Task deleted successfully".to_string(),
    }))
}
