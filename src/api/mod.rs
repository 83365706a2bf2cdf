//! HTTP API for task management.

pub mod error;
pub mod routes;
pub mod tasks;

pub use error::ApiError;
pub use routes::{app, serve, AppState};
