//! Runtime configuration: where the task database and log file live.
//!
//! Resolution order for the database path:
//! 1. `--db <PATH>` (or the `TODO_DB` environment variable, via clap)
//! 2. `<data dir>/todo.db`
//!
//! The data directory is `TODO_HOME` if set, otherwise `$HOME/.todo`, falling
//! back to `./.todo` when no home directory is known.

use std::path::{Path, PathBuf};

use crate::store::Backend;

pub const DB_FILE_NAME: &str = "todo.db";
pub const LOG_FILE_NAME: &str = "todo.log";
pub const DATA_DIR_NAME: &str = ".todo";

/// Resolved paths and backend for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub backend: Backend,
    pub log_file: PathBuf,
}

impl Config {
    /// Resolve configuration from the CLI flag and the process environment.
    pub fn resolve(db: Option<PathBuf>) -> Self {
        Self::resolve_with(
            db,
            std::env::var_os("TODO_HOME").map(PathBuf::from),
            std::env::var_os("HOME").map(PathBuf::from),
        )
    }

    /// Resolution with the environment passed in explicitly.
    pub fn resolve_with(db: Option<PathBuf>, todo_home: Option<PathBuf>, home: Option<PathBuf>) -> Self {
        let data_dir = todo_home.unwrap_or_else(|| {
            home.unwrap_or_else(|| PathBuf::from("."))
                .join(DATA_DIR_NAME)
        });
        let db_path = db.unwrap_or_else(|| data_dir.join(DB_FILE_NAME));
        let backend = Backend::for_path(&db_path);
        let log_file = data_dir.join(LOG_FILE_NAME);
        Config {
            data_dir,
            db_path,
            backend,
            log_file,
        }
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
