//! Command-line interface for planboard
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group lives in its own submodule.

use std::future::Future;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::output::OutputOptions;

mod board;
mod init;
mod user;

/// planboard - ordered task board
///
/// Tasks live in status columns with a stable order. Moves are applied
/// locally first and rolled back if the store rejects them.
#[derive(Parser, Debug)]
#[command(name = "planboard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to the platform data dir)
    #[arg(long, global = true, env = "PLANBOARD_DATA")]
    pub data_dir: Option<PathBuf>,

    /// User to act as
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Limit the board to one project
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and default config
    Init,

    /// Session identity
    #[command(subcommand)]
    User(UserCommands),

    /// Add a task to the default column
    Add {
        /// Task title
        title: String,

        /// Longer description
        #[arg(short, long)]
        description: Option<String>,

        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        due: Option<String>,

        /// Priority: low, medium, high
        #[arg(short, long)]
        priority: Option<String>,

        /// Label (repeatable)
        #[arg(short, long = "label")]
        labels: Vec<String>,
    },

    /// Show the board, one section per status
    Board,

    /// Move a task to a status column and position
    Move {
        /// Task id (or unique prefix)
        id: String,

        /// Target status
        status: String,

        /// Position in the target column (defaults to the end)
        #[arg(short, long)]
        index: Option<usize>,

        /// Expected current status; the move is refused if it differs
        #[arg(long)]
        from: Option<String>,
    },

    /// Edit task fields
    Edit {
        /// Task id (or unique prefix)
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,

        /// Priority: low, medium, high
        #[arg(short, long)]
        priority: Option<String>,

        /// Replace labels (repeatable)
        #[arg(short, long = "label", conflicts_with = "clear_labels")]
        labels: Vec<String>,

        /// Remove all labels
        #[arg(long)]
        clear_labels: bool,
    },

    /// Delete a task
    Rm {
        /// Task id (or unique prefix)
        id: String,
    },

    /// Completion rate, overdue count and seven-day trend
    Stats,

    /// Tasks due in one week, by day
    Calendar {
        /// Any date in the week to show (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        week: Option<String>,

        /// Weeks to shift from --week (negative goes back)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        offset: i64,
    },
}

/// Identity subcommands
#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Persist the user id in the data directory
    Set {
        /// User id
        id: String,
    },

    /// Show the resolved user
    Show,
}

/// Flags shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub data_dir: Option<PathBuf>,
    pub user: Option<String>,
    pub project: Option<String>,
    pub output: OutputOptions,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let global = GlobalOptions {
            data_dir: self.data_dir,
            user: self.user,
            project: self.project,
            output: OutputOptions {
                json: self.json,
                quiet: self.quiet,
            },
        };

        match self.command {
            Commands::Init => init::run(&global),
            Commands::User(cmd) => match cmd {
                UserCommands::Set { id } => user::run_set(&global, &id),
                UserCommands::Show => user::run_show(&global),
            },
            Commands::Add {
                title,
                description,
                due,
                priority,
                labels,
            } => block_on(board::run_add(
                &global,
                board::AddOptions {
                    title,
                    description,
                    due,
                    priority,
                    labels,
                },
            )),
            Commands::Board => block_on(board::run_board(&global)),
            Commands::Move {
                id,
                status,
                index,
                from,
            } => block_on(board::run_move(
                &global,
                board::MoveOptions {
                    id,
                    status,
                    index,
                    from,
                },
            )),
            Commands::Edit {
                id,
                title,
                description,
                due,
                clear_due,
                priority,
                labels,
                clear_labels,
            } => block_on(board::run_edit(
                &global,
                board::EditOptions {
                    id,
                    title,
                    description,
                    due,
                    clear_due,
                    priority,
                    labels,
                    clear_labels,
                },
            )),
            Commands::Rm { id } => block_on(board::run_rm(&global, &id)),
            Commands::Stats => block_on(board::run_stats(&global)),
            Commands::Calendar { week, offset } => {
                block_on(board::run_calendar(&global, week.as_deref(), offset))
            }
        }
    }
}

/// Drive one command on a single-threaded runtime.
fn block_on<F>(future: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn move_accepts_index_and_from() {
        let cli = Cli::try_parse_from([
            "planboard", "--json", "move", "abc", "done", "--index", "2", "--from", "todo",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Move {
                id,
                status,
                index,
                from,
            } => {
                assert_eq!(id, "abc");
                assert_eq!(status, "done");
                assert_eq!(index, Some(2));
                assert_eq!(from.as_deref(), Some("todo"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn calendar_offset_may_be_negative() {
        let cli = Cli::try_parse_from(["planboard", "calendar", "--offset", "-1"]).unwrap();
        assert!(matches!(cli.command, Commands::Calendar { offset: -1, .. }));
    }
}
