//! Error types for storage and task operations.
//!
//! Errors are never swallowed: every failure of a store call reaches the caller
//! of the corresponding `TaskStateManager` operation. The only silent outcome is
//! a blank task name, which is a documented no-op rather than an error.

use thiserror::Error;

use crate::task::TaskId;

/// Failures reported by a `TaskStore`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record does not exist in the store.
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data violates an invariant (duplicate ids, bad counter).
    #[error("Corrupt store: {0}")]
    Corrupt(String),

    /// The store was closed and can no longer be used.
    #[error("Store is closed")]
    Closed,

    /// A blocking storage job panicked or was cancelled.
    #[error("Storage job failed: {0}")]
    Background(#[from] tokio::task::JoinError),
}

/// Failures reported by `TaskStateManager` operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The id is not part of the authoritative collection or store.
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),

    /// The store handed out an id that is already live.
    #[error("Duplicate task id from store: {0}")]
    DuplicateId(TaskId),

    /// `clear_completed` stopped part way through.
    #[error("Clear completed stopped after deleting {deleted} task(s), {remaining} completed task(s) remain: {source}")]
    ClearCompleted {
        deleted: usize,
        remaining: usize,
        #[source]
        source: Box<TaskError>,
    },
}

impl From<StoreError> for TaskError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => TaskError::NotFound(id),
            other => TaskError::Storage(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type TaskResult<T> = Result<T, TaskError>;
