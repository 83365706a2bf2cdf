//! Task persistence.
//!
//! The API layer only talks to the `TaskStore` trait. The store handle is
//! built once at startup, shared across requests through `SharedTaskStore`
//! and closed on shutdown.

mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::task::{NewTask, Task, TaskPatch, TaskSort, ValidationError};

pub use sqlite::SqliteTaskStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Task {0} not found")]
    NotFound(String),

    #[error("Task {id} is at version {actual}, expected {expected}")]
    Conflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Task store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage backend for tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// All tasks in the requested order.
    async fn list(&self, sort: TaskSort) -> StoreResult<Vec<Task>>;

    async fn get(&self, id: &str) -> StoreResult<Task>;

    /// Validate and persist a new task, assigning its id and timestamps.
    async fn create(&self, new_task: NewTask) -> StoreResult<Task>;

    /// Merge `patch` into the stored task and return the new state.
    async fn update(&self, id: &str, patch: TaskPatch) -> StoreResult<Task>;

    /// Hard delete.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    async fn count(&self) -> StoreResult<usize>;

    /// Release the underlying connection. Later calls fail with `Unavailable`.
    async fn close(&self) -> StoreResult<()>;
}

pub type SharedTaskStore = Arc<dyn TaskStore>;
