//! CLI command definitions for todo-state
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::OutputFormat;
use crate::types::Filter;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Filter selection on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FilterArg {
    #[default]
    All,
    Active,
    Completed,
}

impl From<FilterArg> for Filter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => Filter::All,
            FilterArg::Active => Filter::Active,
            FilterArg::Completed => Filter::Completed,
        }
    }
}

/// Output format on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FormatArg {
    #[default]
    Text,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

/// Task list front-end
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr, or filename (overrides config)
    #[arg(short, long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a task
    Add {
        /// Task title
        title: String,

        /// Deadline as yyyy/mm/dd or yyyy-mm-dd
        #[arg(long, value_name = "DATE")]
        deadline: Option<String>,
    },

    /// List tasks
    List {
        #[arg(short, long, value_enum, default_value_t)]
        filter: FilterArg,

        #[arg(long, value_enum, default_value_t)]
        format: FormatArg,
    },

    /// Flip a task between active and completed
    Toggle {
        id: i64,
    },

    /// Change a task's title and deadline
    Edit {
        id: i64,

        /// New title
        title: String,

        /// New deadline as yyyy/mm/dd or yyyy-mm-dd (keeps the current one if omitted)
        #[arg(long, value_name = "DATE", conflicts_with = "clear_deadline")]
        deadline: Option<String>,

        /// Remove the deadline
        #[arg(long)]
        clear_deadline: bool,
    },

    /// Delete a task
    Delete {
        id: i64,
    },

    /// Print the list every time it changes, until interrupted
    Watch {
        #[arg(short, long, value_enum, default_value_t)]
        filter: FilterArg,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add_with_deadline() {
        let cli = Cli::try_parse_from([
            "todo-state",
            "add",
            "Buy milk",
            "--deadline",
            "2026/10/18",
        ])
        .unwrap();
        match cli.command {
            Command::Add { title, deadline } => {
                assert_eq!(title, "Buy milk");
                assert_eq!(deadline.as_deref(), Some("2026/10/18"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_list_filter() {
        let cli = Cli::try_parse_from([
            "todo-state",
            "--verbose",
            "list",
            "--filter",
            "completed",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::List { filter, format } => {
                assert_eq!(Filter::from(filter), Filter::Completed);
                assert_eq!(OutputFormat::from(format), OutputFormat::Text);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_edit_deadline_flags_conflict() {
        let result = Cli::try_parse_from([
            "todo-state",
            "edit",
            "1",
            "title",
            "--deadline",
            "2026/01/01",
            "--clear-deadline",
        ]);
        assert!(result.is_err());
    }
}
