//! # todo - a single-user task list
//!
//! Keep a short list of things to do from the command line or from an
//! interactive terminal interface.
//!
//! ## Quick Start
//!
//! ```bash
//! # Add a couple of tasks
//! todo add Buy milk
//! todo add Walk the dog
//!
//! # Mark one done and see what is left
//! todo complete 1
//! todo list --filter active
//!
//! # Or manage everything interactively
//! todo ui
//! ```
//!
//! ## Key Commands
//!
//! - `todo ui` - Interactive list with All / Active / Completed views
//! - `todo add <name>` - Create a task
//! - `todo list [--filter all|active|completed]` - Print tasks and the active count
//! - `todo rename <id> <name>` - Rename a task
//! - `todo complete <id>` / `todo reopen <id>` - Toggle completion
//! - `todo delete <id>` - Delete a task
//! - `todo clear-completed` - Delete every completed task
//! - `todo backup` - Copy the database into a timestamped backup
//!
//! Data lives in `~/.todo/todo.db` (SQLite) unless `TODO_HOME`, `TODO_DB` or
//! `--db` say otherwise. A `--db` path ending in `.json` uses a plain JSON file
//! instead. Logging is controlled by `TODO_LOG` (default `warn`); the UI writes
//! its log to `<data dir>/todo.log` so the terminal stays clean.

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod fields;
pub mod filter;
pub mod locks;
pub mod manager;
pub mod notifier;
pub mod store;
pub mod task;
pub mod tui {
    pub mod colors;
    pub mod app;
    pub mod enums;
    pub mod input;
    pub mod run;
    pub mod utils;
}

use cli::Cli;
use cmd::*;
use config::Config;
use manager::TaskStateManager;
use store::open_store;

const LOG_ENV: &str = "TODO_LOG";

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global tracing subscriber.
///
/// The UI owns the terminal, so in that mode events go to the log file
/// instead of stderr.
fn init_logging(config: &Config, to_file: bool) {
    if !to_file {
        tracing_subscriber::fmt()
            .with_env_filter(log_filter())
            .with_writer(std::io::stderr)
            .init();
        return;
    }

    let file = config.ensure_data_dir().and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
    });
    match file {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(log_filter())
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init(),
        Err(e) => {
            eprintln!(
                "Warning: cannot open log file {}: {}",
                config.log_file.display(),
                e
            );
            tracing_subscriber::fmt()
                .with_env_filter(log_filter())
                .with_writer(std::io::sink)
                .init();
        }
    }
}

async fn run(command: Commands, config: &Config) -> anyhow::Result<()> {
    // Commands that don't need an open store.
    match command {
        Commands::Completions { shell } => {
            cmd_completions(shell);
            return Ok(());
        }
        Commands::Backup => return cmd_backup(config.db_path()),
        _ => {}
    }

    tracing::debug!(path = %config.db_path().display(), backend = ?config.backend, "opening task list");
    let store = open_store(config.db_path())
        .await
        .with_context(|| format!("opening {}", config.db_path().display()))?;
    let manager = Arc::new(
        TaskStateManager::open(store)
            .await
            .context("loading tasks")?,
    );

    let result = match command {
        Commands::Ui => cmd_ui(Arc::clone(&manager)).await,
        Commands::Add { name } => cmd_add(&manager, name).await,
        Commands::List { filter } => {
            cmd_list(&manager, filter);
            Ok(())
        }
        Commands::Rename { id, name } => cmd_rename(&manager, id, name).await,
        Commands::Complete { id } => cmd_set_completed(&manager, id, true).await,
        Commands::Reopen { id } => cmd_set_completed(&manager, id, false).await,
        Commands::Delete { id } => cmd_delete(&manager, id).await,
        Commands::ClearCompleted => cmd_clear_completed(&manager).await,
        Commands::Completions { .. } | Commands::Backup => unreachable!("handled above"),
    };

    let closed = manager.close().await.context("closing task store");
    result?;
    closed
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let config = Config::resolve(cli.db);
    init_logging(&config, matches!(cli.command, Commands::Ui));

    if let Err(e) = run(cli.command, &config).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
