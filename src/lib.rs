//! # taskboard
//!
//! A small self-hosted task manager.
//!
//! This library provides:
//! - An HTTP API for creating, listing, updating and deleting tasks
//! - A SQLite-backed task store with an explicit open/close lifecycle
//! - A client-side board reducer that mirrors the server's confirmed state
//!
//! ## Architecture
//!
//! ```text
//!   client ──HTTP/JSON──▶ ┌────────────────┐       ┌────────────────┐
//!                         │   api (axum)   │──────▶│  TaskStore     │
//!   TaskBoard ◀─confirm── │ /api/tasks/... │       │  (SQLite)      │
//!                         └────────────────┘       └────────────────┘
//! ```
//!
//! ## Request Flow
//! 1. Handler extracts and shape-checks the JSON body
//! 2. Store validates required fields and persists
//! 3. Result is serialized to JSON, failures become `{"error": ...}`
//!
//! ## Modules
//! - `api`: router, handlers and error responses
//! - `store`: `TaskStore` trait and its SQLite implementation
//! - `task`: task types and validation
//! - `board`: client-side reducer over confirmed API outcomes
//! - `config`: environment configuration

pub mod api;
pub mod board;
pub mod config;
pub mod store;
pub mod task;

pub use config::Config;
pub use store::{SharedTaskStore, SqliteTaskStore, StoreError, TaskStore};
pub use task::{NewTask, Task, TaskPatch, TaskSort};
