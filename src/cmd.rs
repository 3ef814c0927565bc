//! Command implementations for the CLI interface.
//!
//! Every command that touches tasks goes through `TaskStateManager`; nothing
//! here talks to a store directly. Handlers return errors to `main`, which
//! prints them and sets the exit status.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Local;
use clap::Subcommand;
use clap_complete::{generate, Shell};

use crate::fields::FilterMode;
use crate::manager::TaskStateManager;
use crate::task::{TaskId, TaskRecord};
use crate::tui::run::run_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the interactive UI.
    Ui,

    /// Add a new task.
    Add {
        /// What needs to be done. Multiple words are joined with spaces.
        #[arg(required = true)]
        name: Vec<String>,
    },

    /// List tasks.
    List {
        /// Which tasks to show: all | active | completed.
        #[arg(long, value_enum, default_value_t = FilterMode::All)]
        filter: FilterMode,
    },

    /// Rename a task.
    Rename {
        /// Task ID.
        id: TaskId,
        /// New name. Multiple words are joined with spaces.
        #[arg(required = true)]
        name: Vec<String>,
    },

    /// Mark a task completed.
    Complete {
        /// Task ID.
        id: TaskId,
    },

    /// Mark a completed task active again.
    Reopen {
        /// Task ID.
        id: TaskId,
    },

    /// Delete a task.
    Delete {
        /// Task ID.
        id: TaskId,
    },

    /// Delete every completed task.
    ClearCompleted,

    /// Copy the database file into a timestamped backup.
    Backup,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Footer text shared by the list command and the UI.
pub fn items_left_label(count: usize) -> String {
    format!("{count} active item(s) left")
}

/// Checkbox marker for a task row.
pub fn checkbox(completed: bool) -> &'static str {
    if completed {
        "[x]"
    } else {
        "[ ]"
    }
}

/// Render tasks as table lines, header first.
pub fn render_table(tasks: &[TaskRecord]) -> Vec<String> {
    let mut lines = Vec::with_capacity(tasks.len() + 1);
    lines.push(format!("{:<5} {:<4} {}", "ID", "Done", "Task"));
    for t in tasks {
        lines.push(format!("{:<5} {:<4} {}", t.id, checkbox(t.completed), t.name));
    }
    lines
}

pub async fn cmd_ui(manager: Arc<TaskStateManager>) -> anyhow::Result<()> {
    run_tui(manager).await.context("UI error")
}

pub async fn cmd_add(manager: &TaskStateManager, name: Vec<String>) -> anyhow::Result<()> {
    match manager.add_task(&name.join(" ")).await? {
        Some(task) => println!("Added task {}: {}", task.id, task.name),
        None => bail!("task name cannot be blank"),
    }
    Ok(())
}

pub fn cmd_list(manager: &TaskStateManager, filter: FilterMode) {
    manager.set_filter(filter);
    let visible = manager.visible_tasks();
    if visible.is_empty() {
        println!("No {} tasks.", filter);
    } else {
        for line in render_table(&visible) {
            println!("{line}");
        }
    }
    println!("{}", items_left_label(manager.active_count()));
}

pub async fn cmd_rename(manager: &TaskStateManager, id: TaskId, name: Vec<String>) -> anyhow::Result<()> {
    if !manager.rename_task(id, &name.join(" ")).await? {
        bail!("task name cannot be blank");
    }
    println!("Renamed task {id}.");
    Ok(())
}

pub async fn cmd_set_completed(manager: &TaskStateManager, id: TaskId, completed: bool) -> anyhow::Result<()> {
    manager.set_completed(id, completed).await?;
    if completed {
        println!("Marked task {id} done.");
    } else {
        println!("Reopened task {id}.");
    }
    Ok(())
}

pub async fn cmd_delete(manager: &TaskStateManager, id: TaskId) -> anyhow::Result<()> {
    manager.delete_task(id).await?;
    println!("Deleted task {id}.");
    Ok(())
}

pub async fn cmd_clear_completed(manager: &TaskStateManager) -> anyhow::Result<()> {
    let deleted = manager.clear_completed().await?;
    println!("Cleared {deleted} completed task(s).");
    Ok(())
}

pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;
    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

/// Copy the database into `<db dir>/backup/<timestamp>_<file name>`.
pub fn create_backup(db_path: &Path) -> anyhow::Result<PathBuf> {
    if !db_path.exists() {
        bail!("database file {} does not exist", db_path.display());
    }

    let parent_dir = db_path.parent().unwrap_or_else(|| Path::new("."));
    let backup_dir = parent_dir.join("backup");
    fs::create_dir_all(&backup_dir)
        .with_context(|| format!("creating {}", backup_dir.display()))?;

    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let db_filename = db_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("todo.db");
    let backup_path = backup_dir.join(format!("{timestamp}_{db_filename}"));

    fs::copy(db_path, &backup_path)
        .with_context(|| format!("copying {} to {}", db_path.display(), backup_path.display()))?;
    tracing::info!(backup = %backup_path.display(), "created backup");
    Ok(backup_path)
}

pub fn cmd_backup(db_path: &Path) -> anyhow::Result<()> {
    let backup_path = create_backup(db_path)?;
    println!("Backup created: {}", backup_path.display());
    Ok(())
}
