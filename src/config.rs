//! Process configuration.
//!
//! Read once from environment variables at startup:
//! - `HOST` - bind address (default `127.0.0.1`)
//! - `PORT` - bind port (default `3000`)
//! - `DATABASE_PATH` - SQLite file, or `:memory:` (default `./data/tasks.db`)
//! - `TASK_SORT` - default list order, `dueDate` or `createdAt` (default `dueDate`)

use std::path::PathBuf;

use thiserror::Error;

use crate::store::{SqliteTaskStore, StoreResult};
use crate::task::TaskSort;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATABASE_PATH: &str = "./data/tasks.db";
const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid PORT {0:?}: expected an integer between 0 and 65535")]
    InvalidPort(String),

    #[error("Invalid TASK_SORT {0:?}: expected dueDate or createdAt")]
    InvalidSort(String),

    #[error("DATABASE_PATH cannot be empty")]
    EmptyDatabasePath,
}

/// Where tasks are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    Memory,
}

impl StoreLocation {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim() {
            "" => Err(ConfigError::EmptyDatabasePath),
            IN_MEMORY => Ok(Self::Memory),
            path => Ok(Self::File(PathBuf::from(path))),
        }
    }

    /// Open the store this location points at.
    pub fn open(&self) -> StoreResult<SqliteTaskStore> {
        match self {
            Self::File(path) => SqliteTaskStore::open(path),
            Self::Memory => SqliteTaskStore::open_in_memory(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: StoreLocation,
    /// Ordering used by `GET /api/tasks` when the request names none.
    pub default_sort: TaskSort,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: StoreLocation::File(PathBuf::from(DEFAULT_DATABASE_PATH)),
            default_sort: TaskSort::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(defaults.host);

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => defaults.port,
        };

        let database = match lookup("DATABASE_PATH") {
            Some(raw) => StoreLocation::parse(&raw)?,
            None => defaults.database,
        };

        let default_sort = match lookup("TASK_SORT") {
            Some(raw) => raw
                .parse::<TaskSort>()
                .map_err(|_| ConfigError::InvalidSort(raw))?,
            None => defaults.default_sort,
        };

        Ok(Self {
            host,
            port,
            database,
            default_sort,
        })
    }

    /// `host:port` string for binding the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
        assert_eq!(
            config.database,
            StoreLocation::File(PathBuf::from("./data/tasks.db"))
        );
        assert_eq!(config.default_sort, TaskSort::DueDate);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "8080"),
            ("DATABASE_PATH", ":memory:"),
            ("TASK_SORT", "createdAt"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.database, StoreLocation::Memory);
        assert_eq!(config.default_sort, TaskSort::CreatedAt);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("PORT", "eighty")])),
            Err(ConfigError::InvalidPort(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("TASK_SORT", "title")])),
            Err(ConfigError::InvalidSort(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("DATABASE_PATH", "  ")])),
            Err(ConfigError::EmptyDatabasePath)
        ));
    }

    #[test]
    fn test_memory_location_opens() {
        let store = StoreLocation::Memory.open().unwrap();
        assert_eq!(store.location(), ":memory:");
    }
}
