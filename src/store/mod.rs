//! Durable task storage.
//!
//! `TaskStore` is the capability the state manager persists through. Every
//! method that returns `Ok` has made its change durable before returning.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::task::{TaskId, TaskRecord};

pub mod json;
pub mod sqlite;

pub use json::JsonFileStore;
pub use sqlite::SqliteStore;

/// Durable key-value record store for tasks.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new, not completed task and return its freshly assigned id.
    async fn create_task(&self, name: &str) -> StoreResult<TaskId>;

    /// Replace a task's name. Fails with `StoreError::NotFound` if absent.
    async fn update_task_name(&self, id: TaskId, name: &str) -> StoreResult<()>;

    /// Set a task's completion flag. Fails with `StoreError::NotFound` if absent.
    async fn update_task_completion(&self, id: TaskId, completed: bool) -> StoreResult<()>;

    /// Remove a task. Fails with `StoreError::NotFound` if absent.
    async fn delete_task(&self, id: TaskId) -> StoreResult<()>;

    /// Every stored task, in insertion order.
    async fn load_all(&self) -> StoreResult<Vec<TaskRecord>>;

    /// End the store's lifecycle. Later calls fail with `StoreError::Closed`.
    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Storage engine selected for a database path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Json,
}

impl Backend {
    /// `.json` files use the document store, everything else SQLite.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Backend::Json,
            _ => Backend::Sqlite,
        }
    }
}

/// Open the store for `path` using the backend its extension selects.
pub async fn open_store(path: &Path) -> StoreResult<Arc<dyn TaskStore>> {
    let store: Arc<dyn TaskStore> = match Backend::for_path(path) {
        Backend::Sqlite => Arc::new(SqliteStore::open(path).await?),
        Backend::Json => Arc::new(JsonFileStore::open(path).await?),
    };
    tracing::debug!(path = %path.display(), "opened task store");
    Ok(store)
}
