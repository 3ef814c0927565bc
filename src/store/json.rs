//! Single-file JSON task store.
//!
//! The whole task list lives in one pretty-printed JSON document. Every
//! mutation rewrites the document atomically (temp file, fsync, rename) and only
//! then updates the cached copy, so a failed write leaves both disk and cache
//! as they were.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::store::TaskStore;
use crate::task::{normalise_name, TaskId, TaskRecord};

/// On-disk document layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDocument {
    /// Next id to hand out. Only ever grows, so deleted ids are never reissued.
    pub next_id: TaskId,
    pub tasks: Vec<TaskRecord>,
}

impl Default for TaskDocument {
    fn default() -> Self {
        TaskDocument {
            next_id: 1,
            tasks: Vec::new(),
        }
    }
}

impl TaskDocument {
    /// Load the document, treating a missing file as an empty store.
    pub fn load(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Ok(TaskDocument::default());
        }
        let buf = fs::read_to_string(path)?;
        let doc: TaskDocument = serde_json::from_str(&buf)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Save via temp file + rename so readers never see a half-written file.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(self)?;
        let mut f = File::create(&tmp)?;
        f.write_all(data.as_bytes())?;
        f.sync_all()?;
        fs::rename(tmp, path)?;
        sync_parent_dir(path)?;
        Ok(())
    }

    fn validate(&self) -> StoreResult<()> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id) {
                return Err(StoreError::Corrupt(format!("duplicate task id {}", task.id)));
            }
            if normalise_name(&task.name).is_none() {
                return Err(StoreError::Corrupt(format!("task {} has a blank name", task.id)));
            }
            if task.id >= self.next_id {
                return Err(StoreError::Corrupt(format!(
                    "task id {} is not below next_id {}",
                    task.id, self.next_id
                )));
            }
        }
        Ok(())
    }

    fn position(&self, id: TaskId) -> StoreResult<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(StoreError::NotFound(id))
    }
}

/// Flush the directory entry so a completed rename survives a crash.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> StoreResult<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> StoreResult<()> {
    Ok(())
}

/// Task store backed by one JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    doc: Mutex<Option<TaskDocument>>,
}

impl JsonFileStore {
    /// Open the store at `path`, creating parent directories as needed.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        let owned = path.to_path_buf();
        let doc = tokio::task::spawn_blocking(move || -> StoreResult<TaskDocument> {
            if let Some(parent) = owned.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            TaskDocument::load(&owned)
        })
        .await??;
        tracing::info!(path = %path.display(), tasks = doc.tasks.len(), "opened json task store");
        Ok(JsonFileStore {
            path: path.to_path_buf(),
            doc: Mutex::new(Some(doc)),
        })
    }

    /// Apply `edit` to a copy of the document, persist it, then publish it.
    async fn commit<T, F>(&self, edit: F) -> StoreResult<T>
    where
        F: FnOnce(&mut TaskDocument) -> StoreResult<T>,
    {
        let mut guard = self.doc.lock().await;
        let current = guard.as_ref().ok_or(StoreError::Closed)?;
        let mut next = current.clone();
        let out = edit(&mut next)?;

        let path = self.path.clone();
        let to_write = next.clone();
        tokio::task::spawn_blocking(move || to_write.save(&path)).await??;

        *guard = Some(next);
        Ok(out)
    }
}

#[async_trait]
impl TaskStore for JsonFileStore {
    async fn create_task(&self, name: &str) -> StoreResult<TaskId> {
        self.commit(|doc| {
            let id = doc.next_id;
            doc.next_id += 1;
            doc.tasks.push(TaskRecord::new(id, name));
            Ok(id)
        })
        .await
    }

    async fn update_task_name(&self, id: TaskId, name: &str) -> StoreResult<()> {
        self.commit(|doc| {
            let idx = doc.position(id)?;
            doc.tasks[idx].name = name.to_string();
            Ok(())
        })
        .await
    }

    async fn update_task_completion(&self, id: TaskId, completed: bool) -> StoreResult<()> {
        self.commit(|doc| {
            let idx = doc.position(id)?;
            doc.tasks[idx].completed = completed;
            Ok(())
        })
        .await
    }

    async fn delete_task(&self, id: TaskId) -> StoreResult<()> {
        self.commit(|doc| {
            let idx = doc.position(id)?;
            doc.tasks.remove(idx);
            Ok(())
        })
        .await
    }

    async fn load_all(&self) -> StoreResult<Vec<TaskRecord>> {
        let guard = self.doc.lock().await;
        let doc = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(doc.tasks.clone())
    }

    async fn close(&self) -> StoreResult<()> {
        self.doc.lock().await.take();
        Ok(())
    }
}
