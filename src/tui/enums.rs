//! Enumerations for TUI state management.

use crate::task::TaskId;

/// Which screen or input mode the UI is in.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AppState {
    /// Moving around the list.
    Browse,
    /// Typing into the "What needs to be done?" box.
    AddTask,
    /// Renaming an existing task inline.
    EditTask(TaskId),
    Help,
}

impl AppState {
    /// Whether keystrokes go to the text input.
    pub fn is_text_entry(self) -> bool {
        matches!(self, AppState::AddTask | AppState::EditTask(_))
    }

    /// Status bar label for this state.
    pub fn label(self) -> String {
        match self {
            AppState::Browse => "Tasks".to_string(),
            AppState::AddTask => "Add task (Enter to add, Esc to finish)".to_string(),
            AppState::EditTask(id) => format!("Rename task {id} (Enter to save, Esc to cancel)"),
            AppState::Help => "Help".to_string(),
        }
    }
}
