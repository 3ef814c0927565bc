//! Task data structure.
//!
//! A `TaskRecord` is the unit the whole application revolves around: the store
//! assigns its id, the state manager owns it in memory, and the views render it.

use serde::{Deserialize, Serialize};

/// Store-assigned task identifier. Never reissued after deletion.
pub type TaskId = i64;

/// A single entry in the task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub completed: bool,
}

impl TaskRecord {
    /// A freshly created, not yet completed task.
    pub fn new(id: TaskId, name: impl Into<String>) -> Self {
        TaskRecord {
            id,
            name: name.into(),
            completed: false,
        }
    }
}

/// Normalise a user supplied task name.
///
/// Returns `None` for blank input, which callers treat as "ignore this submit".
pub fn normalise_name(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
