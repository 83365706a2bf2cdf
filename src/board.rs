//! Client-side task board state.
//!
//! Models the list a UI keeps while talking to the API. The board is a pure
//! reducer: it only changes when a server response confirms an operation,
//! so a failed request never leaves the local list out of sync.

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId};

/// API operation a board event confirms or reports a failure for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardOp {
    Load,
    Create,
    Update,
    Delete,
}

impl BoardOp {
    fn failure_message(&self) -> &'static str {
        match self {
            Self::Load => "Failed to fetch tasks",
            Self::Create => "Failed to create task",
            Self::Update => "Failed to update task",
            Self::Delete => "Failed to delete task",
        }
    }
}

/// A server outcome to fold into the board.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    /// Full list returned by `GET /api/tasks`
    Loaded(Vec<Task>),
    /// Task returned by `POST /api/tasks`
    Created(Task),
    /// Task returned by `PUT /api/tasks/:id`
    Updated(Task),
    /// `DELETE /api/tasks/:id` succeeded
    Deleted(TaskId),
    /// Request failed; `message` is the server's error text, if any
    Failed { op: BoardOp, message: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient notification shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub description: String,
}

impl Notice {
    fn success(description: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            title: "Success".to_string(),
            description: description.into(),
        }
    }

    fn error(description: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: "Error".to_string(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    tasks: Vec<Task>,
    notices: Vec<Notice>,
    loaded: bool,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Whether the initial load has finished, successfully or not.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Take pending notices, leaving none behind.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Fold one confirmed outcome into the board.
    pub fn apply(&mut self, event: BoardEvent) {
        match event {
            BoardEvent::Loaded(tasks) => {
                self.tasks = tasks;
                self.loaded = true;
            }
            BoardEvent::Created(task) => {
                self.tasks.retain(|t| t.id != task.id);
                self.tasks.insert(0, task);
                self.notices.push(Notice::success("Task created successfully"));
            }
            BoardEvent::Updated(task) => {
                match self.tasks.iter_mut().find(|t| t.id == task.id) {
                    Some(existing) => *existing = task,
                    None => {
                        tracing::debug!(id = %task.id, "Update confirmed for task not on board");
                    }
                }
                self.notices.push(Notice::success("Task updated successfully"));
            }
            BoardEvent::Deleted(id) => {
                self.tasks.retain(|t| t.id != id);
                self.notices.push(Notice::success("Task deleted successfully"));
            }
            BoardEvent::Failed { op, message } => {
                if op == BoardOp::Load {
                    self.loaded = true;
                }
                let description = message.unwrap_or_else(|| op.failure_message().to_string());
                self.notices.push(Notice::error(description));
            }
        }
    }
}
