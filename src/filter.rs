//! Derived views over the task collection.
//!
//! Pure functions: no locking, no I/O, same input always gives the same output.

use crate::fields::FilterMode;
use crate::task::TaskRecord;

/// Tasks visible under `mode`, in collection order.
pub fn visible_tasks(tasks: &[TaskRecord], mode: FilterMode) -> Vec<TaskRecord> {
    tasks
        .iter()
        .filter(|t| mode.admits(t.completed))
        .cloned()
        .collect()
}

/// Number of tasks not yet completed, regardless of any filter.
pub fn active_count(tasks: &[TaskRecord]) -> usize {
    tasks.iter().filter(|t| !t.completed).count()
}
