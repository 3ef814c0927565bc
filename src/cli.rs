//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// Single-user task list.
/// Storage defaults to ~/.todo/todo.db or a path passed via --db.
#[derive(Parser)]
#[command(name = "todo", version, about = "Keep a short list of things to do")]
pub struct Cli {
    /// Path to the task database (.json selects the JSON store, anything else SQLite).
    #[arg(long, global = true, env = "TODO_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FilterMode;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_list_filter_and_db() {
        let cli = Cli::try_parse_from(["todo", "--db", "/tmp/t.json", "list", "--filter", "completed"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/t.json")));
        match cli.command {
            Commands::List { filter } => assert_eq!(filter, FilterMode::Completed),
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn test_parse_rename_joins_words() {
        let cli = Cli::try_parse_from(["todo", "rename", "3", "Buy", "oat", "milk"]).unwrap();
        match cli.command {
            Commands::Rename { id, name } => {
                assert_eq!(id, 3);
                assert_eq!(name.join(" "), "Buy oat milk");
            }
            _ => panic!("expected rename"),
        }
    }
}
