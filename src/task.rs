//! Task types and field validation.
//!
//! A `Task` is the only resource the service manages. Incoming payloads are
//! deserialized into the loose `NewTask` / `TaskPatch` shapes first, so that
//! a missing field and a malformed field can be told apart and reported with
//! the right message.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Opaque task identifier assigned by the store.
pub type TaskId = String;

/// Validation failures for task payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Title and due date are required")]
    MissingRequired,

    #[error("Title cannot be empty")]
    EmptyTitle,

    #[error("Invalid due date")]
    InvalidDueDate(String),
}

/// A stored task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub completed: bool,
    /// Incremented on every accepted update.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a task.
///
/// Every field is optional at the serde level; `into_task` decides what is
/// actually required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub completed: Option<bool>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, due_date: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            due_date: Some(due_date.into()),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate the payload and build a fresh task stamped with `now`.
    pub fn into_task(self, now: DateTime<Utc>) -> Result<Task, ValidationError> {
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let due_date = self.due_date.filter(|d| !d.trim().is_empty());

        let (Some(title), Some(due_date)) = (title, due_date) else {
            return Err(ValidationError::MissingRequired);
        };

        Ok(Task {
            id: Uuid::new_v4().to_string(),
            title,
            description: self.description.unwrap_or_default(),
            due_date: parse_due_date(&due_date)?,
            completed: self.completed.unwrap_or(false),
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update for an existing task. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub completed: Option<bool>,
    /// When set, the update only applies if the stored version matches.
    pub expected_version: Option<u64>,
}

impl TaskPatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    /// True when the patch carries no field changes.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.completed.is_none()
    }

    /// Merge the patch into `task`, refreshing `updated_at` and bumping the
    /// version. Nothing is written to `task` if validation fails.
    pub fn apply_to(self, task: &mut Task, now: DateTime<Utc>) -> Result<(), ValidationError> {
        let title = match self.title {
            Some(t) if t.trim().is_empty() => return Err(ValidationError::EmptyTitle),
            Some(t) => Some(t.trim().to_string()),
            None => None,
        };
        let due_date = self.due_date.as_deref().map(parse_due_date).transpose()?;

        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(due_date) = due_date {
            task.due_date = due_date;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }

        task.version += 1;
        task.updated_at = now;
        Ok(())
    }
}

/// Parse a due date from either `YYYY-MM-DD` or an RFC 3339 timestamp.
///
/// Timestamps are reduced to their UTC calendar date. Years are limited to
/// four digits so stored dates keep sorting in calendar order.
pub fn parse_due_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| {
            DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc).date_naive())
        })
        .map_err(|_| ValidationError::InvalidDueDate(raw.to_string()))?;

    if !(0..=9999).contains(&date.year()) {
        return Err(ValidationError::InvalidDueDate(raw.to_string()));
    }
    Ok(date)
}

/// Ordering applied when listing tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSort {
    /// Earliest due date first
    DueDate,
    /// Most recently created first
    CreatedAt,
}

impl Default for TaskSort {
    fn default() -> Self {
        Self::DueDate
    }
}

impl TaskSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DueDate => "dueDate",
            Self::CreatedAt => "createdAt",
        }
    }
}

impl fmt::Display for TaskSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown sort key: {0}")]
pub struct UnknownSortKey(pub String);

impl FromStr for TaskSort {
    type Err = UnknownSortKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dueDate" | "due_date" => Ok(Self::DueDate),
            "createdAt" | "created_at" => Ok(Self::CreatedAt),
            other => Err(UnknownSortKey(other.to_string())),
        }
    }
}
