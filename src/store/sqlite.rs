//! SQLite-backed task store.
//!
//! One connection per process, opened explicitly at startup and guarded by a
//! mutex. rusqlite is blocking, so every statement runs on the blocking pool.
//! Schema migrations are tracked with `PRAGMA user_version` and applied
//! before the store is handed out.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{StoreError, StoreResult, TaskStore};
use crate::task::{NewTask, Task, TaskPatch, TaskSort};

const MIGRATIONS: &[&str] = &[
    // v1: tasks table
    "CREATE TABLE IF NOT EXISTS tasks (
        id          TEXT PRIMARY KEY NOT NULL,
        title       TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        due_date    TEXT NOT NULL,
        completed   INTEGER NOT NULL DEFAULT 0,
        version     INTEGER NOT NULL DEFAULT 0,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_tasks_due_date ON tasks(due_date);
    CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);",
];

const SELECT_COLUMNS: &str =
    "id, title, description, due_date, completed, version, created_at, updated_at";

/// Persistent task store over a single SQLite connection.
pub struct SqliteTaskStore {
    conn: Arc<Mutex<Option<Connection>>>,
    location: String,
}

impl SqliteTaskStore {
    /// Open (or create) the database file at `path` and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Unavailable(format!(
                        "Failed to create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        Self::bootstrap(conn, path.display().to_string())
    }

    /// Open a private in-memory database. Contents vanish on close.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn, ":memory:".to_string())
    }

    fn bootstrap(mut conn: Connection, location: String) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        apply_migrations(&mut conn)?;
        tracing::info!("Opened task store at {}", location);

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            location,
        })
    }

    /// Where the database lives (`:memory:` for in-memory stores).
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            let conn = guard
                .as_mut()
                .ok_or_else(|| StoreError::Unavailable("connection closed".to_string()))?;
            f(conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store worker failed: {}", e)))?
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn list(&self, sort: TaskSort) -> StoreResult<Vec<Task>> {
        let order_by = match sort {
            TaskSort::DueDate => "due_date ASC, created_at ASC, rowid ASC",
            TaskSort::CreatedAt => "created_at DESC, rowid DESC",
        };

        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM tasks ORDER BY {order_by}"))?;
            let tasks = stmt
                .query_map([], row_to_task)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
        .await
    }

    async fn get(&self, id: &str) -> StoreResult<Task> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            fetch_task(conn, &id)?.ok_or(StoreError::NotFound(id))
        })
        .await
    }

    async fn create(&self, new_task: NewTask) -> StoreResult<Task> {
        let task = new_task.into_task(now())?;

        let row = task.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, title, description, due_date, completed, version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    row.id,
                    row.title,
                    row.description,
                    format_date(row.due_date),
                    row.completed,
                    row.version as i64,
                    format_timestamp(row.created_at),
                    format_timestamp(row.updated_at),
                ],
            )?;
            Ok(())
        })
        .await?;

        Ok(task)
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> StoreResult<Task> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut task) = fetch_task(&tx, &id)? else {
                return Err(StoreError::NotFound(id));
            };

            if let Some(expected) = patch.expected_version {
                if expected != task.version {
                    return Err(StoreError::Conflict {
                        id,
                        expected,
                        actual: task.version,
                    });
                }
            }

            if patch.is_empty() {
                return Ok(task);
            }

            patch.apply_to(&mut task, now())?;
            tx.execute(
                "UPDATE tasks
                 SET title = ?2,
                     description = ?3,
                     due_date = ?4,
                     completed = ?5,
                     version = ?6,
                     updated_at = ?7
                 WHERE id = ?1",
                params![
                    task.id,
                    task.title,
                    task.description,
                    format_date(task.due_date),
                    task.completed,
                    task.version as i64,
                    format_timestamp(task.updated_at),
                ],
            )?;
            tx.commit()?;

            Ok(task)
        })
        .await
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn count(&self) -> StoreResult<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn close(&self) -> StoreResult<()> {
        let conn = Arc::clone(&self.conn);
        let closed = tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            match guard.take() {
                Some(conn) => conn
                    .close()
                    .map(|_| true)
                    .map_err(|(_, e)| StoreError::from(e)),
                None => Ok(false),
            }
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store worker failed: {}", e)))??;

        if closed {
            tracing::info!("Closed task store at {}", self.location);
        }
        Ok(())
    }
}

fn apply_migrations(conn: &mut Connection) -> StoreResult<()> {
    let current: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    let latest = MIGRATIONS.len() as u32;

    if current > latest {
        return Err(StoreError::Unavailable(format!(
            "database schema version {} is newer than supported {}",
            current, latest
        )));
    }

    for (idx, sql) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let version = idx as u32 + 1;
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        tracing::debug!(version, "Applied task store migration");
    }

    Ok(())
}

fn fetch_task(conn: &Connection, id: &str) -> StoreResult<Option<Task>> {
    let task = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id],
            row_to_task,
        )
        .optional()?;
    Ok(task)
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let due_date: String = row.get(3)?;
    let version: i64 = row.get(5)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        due_date: NaiveDate::parse_from_str(&due_date, "%Y-%m-%d")
            .map_err(|e| conversion_error(3, e))?,
        completed: row.get(4)?,
        version: version as u64,
        created_at: parse_timestamp(&created_at).map_err(|e| conversion_error(6, e))?,
        updated_at: parse_timestamp(&updated_at).map_err(|e| conversion_error(7, e))?,
    })
}

fn conversion_error(idx: usize, e: chrono::ParseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Current time at the precision the store persists.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn milk() -> NewTask {
        NewTask::new("Buy milk", "2025-02-26")
    }

    #[tokio::test]
    async fn test_task_store_lifecycle() {
        let store = SqliteTaskStore::open_in_memory().unwrap();

        let created = store.create(milk()).await.unwrap();
        assert!(!created.completed);
        assert_eq!(store.count().await.unwrap(), 1);

        let fetched = store.get(&created.id).await.unwrap();
        assert_eq!(fetched, created);

        let updated = store
            .update(&created.id, TaskPatch::completed(true))
            .await
            .unwrap();
        assert!(updated.completed);
        assert_eq!(updated.version, 1);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.created_at, created.created_at);

        store.delete(&created.id).await.unwrap();
        assert!(matches!(
            store.get(&created.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_validation_persists_nothing() {
        let store = SqliteTaskStore::open_in_memory().unwrap();

        let result = store
            .create(NewTask {
                due_date: Some("2025-02-26".to_string()),
                ..NewTask::default()
            })
            .await;

        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_ordering() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        let late = store.create(NewTask::new("late", "2025-03-10")).await.unwrap();
        let early = store.create(NewTask::new("early", "2025-01-05")).await.unwrap();
        let middle = store.create(NewTask::new("middle", "2025-02-14")).await.unwrap();

        let by_due: Vec<String> = store
            .list(TaskSort::DueDate)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(by_due, vec![early.id.clone(), middle.id.clone(), late.id.clone()]);

        let by_created: Vec<String> = store
            .list(TaskSort::CreatedAt)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(by_created, vec![middle.id, early.id, late.id]);
    }

    #[tokio::test]
    async fn test_out_of_range_due_date_keeps_ordering() {
        let store = SqliteTaskStore::open_in_memory().unwrap();

        assert!(matches!(
            store.create(NewTask::new("far", "+10000-01-01")).await,
            Err(StoreError::Validation(_))
        ));

        let last = store.create(NewTask::new("last", "9999-12-31")).await.unwrap();
        let near = store.create(NewTask::new("near", "2025-01-01")).await.unwrap();

        let titles: Vec<String> = store
            .list(TaskSort::DueDate)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec![near.title, last.title]);
    }

    #[tokio::test]
    async fn test_missing_ids() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        store.create(milk()).await.unwrap();

        assert!(matches!(
            store.update("nope", TaskPatch::completed(true)).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("nope").await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        let keep = store.create(milk()).await.unwrap();
        let task = store.create(NewTask::new("Walk dog", "2025-02-27")).await.unwrap();

        store.delete(&task.id).await.unwrap();
        assert!(matches!(
            store.delete(&task.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get(&keep.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_version_conflict_leaves_task_untouched() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        let task = store.create(milk()).await.unwrap();

        store
            .update(&task.id, TaskPatch::title("Buy oat milk").expecting_version(0))
            .await
            .unwrap();

        let stale = store
            .update(&task.id, TaskPatch::completed(true).expecting_version(0))
            .await;
        match stale {
            Err(StoreError::Conflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("expected conflict, got {:?}", other),
        }

        let current = store.get(&task.id).await.unwrap();
        assert_eq!(current.title, "Buy oat milk");
        assert!(!current.completed);
        assert_eq!(current.version, 1);
    }

    #[tokio::test]
    async fn test_empty_patch_is_a_no_op() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        let task = store.create(milk()).await.unwrap();

        let same = store.update(&task.id, TaskPatch::default()).await.unwrap();
        assert_eq!(same, task);
    }

    #[tokio::test]
    async fn test_invalid_patch_is_not_persisted() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        let task = store.create(milk()).await.unwrap();

        let patch = TaskPatch {
            due_date: Some("soon".to_string()),
            ..TaskPatch::default()
        };
        assert!(matches!(
            store.update(&task.id, patch).await,
            Err(StoreError::Validation(_))
        ));
        assert_eq!(store.get(&task.id).await.unwrap(), task);
    }

    #[tokio::test]
    async fn test_tasks_survive_reopen() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("data").join("tasks.db");

        let store = SqliteTaskStore::open(&path).unwrap();
        let task = store.create(milk().with_description("2 litres")).await.unwrap();
        store.close().await.unwrap();

        // Create a new store instance to simulate fresh start
        let store2 = SqliteTaskStore::open(&path).unwrap();
        assert_eq!(store2.get(&task.id).await.unwrap(), task);
    }

    #[tokio::test]
    async fn test_closed_store_is_unavailable() {
        let store = SqliteTaskStore::open_in_memory().unwrap();
        store.close().await.unwrap();
        // Closing twice is harmless
        store.close().await.unwrap();

        assert!(matches!(
            store.list(TaskSort::DueDate).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.create(milk()).await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("tasks.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", 99u32).unwrap();
        }

        assert!(matches!(
            SqliteTaskStore::open(&path),
            Err(StoreError::Unavailable(_))
        ));
    }
}
