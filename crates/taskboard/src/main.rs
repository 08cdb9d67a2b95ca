//! CLI entry point for taskboard.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use taskboard_core::{Priority, SortDirection, SortField, TaskStatus};
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use taskboard_app::{AppConfig, default_data_dir};

mod commands;
mod render;

/// Tasks in a list and on a kanban board, mirrored live from the document store.
#[derive(Parser, Debug)]
#[command(
    name = "taskboard",
    version,
    about = "taskboard: a task list and kanban board backed by a live document collection"
)]
struct Cli {
    /// Configuration file (defaults to the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the persisted collection.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a task.
    New {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// high, medium, low or 1-3.
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
        /// Initial kanban column.
        #[arg(short, long, default_value = "todo")]
        status: TaskStatus,
    },

    /// Edit fields of a task.
    Edit {
        /// Task id or unique id prefix.
        task: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(short, long)]
        status: Option<TaskStatus>,
    },

    /// Delete a task.
    Rm {
        /// Task id or unique id prefix.
        task: String,
    },

    /// Mark a task completed.
    Done {
        /// Task id or unique id prefix.
        task: String,
        /// Clear the completion flag instead.
        #[arg(long)]
        undo: bool,
    },

    /// Move a card to another kanban column.
    Move {
        /// Task id or unique id prefix.
        task: String,
        /// Target column: todo, in-progress or completed.
        status: TaskStatus,
    },

    /// List tasks.
    Ls {
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(short, long)]
        status: Option<TaskStatus>,
        /// Only completed tasks.
        #[arg(long, conflicts_with = "pending")]
        completed: bool,
        /// Only tasks not completed yet.
        #[arg(long)]
        pending: bool,
        /// Case-insensitive text searched in title and description.
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "created-at")]
        sort: SortField,
        #[arg(long, default_value = "desc")]
        order: SortDirection,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Show the kanban board.
    Board {
        /// Only show cards with this priority.
        #[arg(short, long)]
        priority: Option<Priority>,
    },

    /// Show statistics.
    Stats {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Print the list (or board) on every change until interrupted.
    Watch {
        /// Render the kanban board instead of the list.
        #[arg(long)]
        board: bool,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let Cli { config, data_dir, cmd } = Cli::parse();

    install_tracing(tracing_level(&cmd));

    let mut config = AppConfig::load(config.as_deref())?;
    if let Some(dir) = data_dir {
        config.backend.data_dir = Some(dir);
    } else if config.backend.data_dir.is_none() {
        config.backend.data_dir = default_data_dir();
    }

    tokio::runtime::Runtime::new()?.block_on(commands::run(cmd, &config))
}

/// `watch` keeps stdout for the view, so only warnings are logged by default.
const fn tracing_level(cmd: &Command) -> Level {
    match cmd {
        Command::Watch { .. } => Level::WARN,
        _ => Level::INFO,
    }
}

fn install_tracing(level: Level) {
    // RUST_LOG directives are honoured; `level` is the default.
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .compact()
        .try_init();
}
