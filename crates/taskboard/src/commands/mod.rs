use anyhow::{Context, Result, bail};
use taskboard_app::{AppConfig, BoardState, TaskBoard};
use taskboard_core::{CreateTaskInput, Priority, TaskId, TaskPatch, TaskStatus};
use taskboard_store::{ClientContext, LocalBackend, TaskStore};

use crate::{Command, OutputFormat};

mod handlers;

use handlers::LsArgs;

type Board = TaskBoard<LocalBackend>;

/// Validate input, connect, run `command`, then close the board.
pub async fn run(command: Command, config: &AppConfig) -> Result<()> {
    let action = Action::prepare(command)?;

    let ctx = ClientContext::new(config.backend(), config.retry_policy());
    let board = TaskBoard::start(TaskStore::new(ctx, config.backend.collection.as_str()));
    let result = match board.loaded().await {
        Ok(state) => action.execute(&board, state).await,
        Err(err) => Err(err).context("failed to load tasks"),
    };
    board.close().await;
    result
}

/// A command whose input passed local validation.
enum Action {
    New(CreateTaskInput),
    Edit { task: String, patch: TaskPatch },
    Rm(String),
    Done { task: String, completed: bool },
    Move { task: String, status: TaskStatus },
    Ls(LsArgs),
    Board(Option<Priority>),
    Stats(OutputFormat),
    Watch { board: bool },
}

impl Action {
    fn prepare(command: Command) -> Result<Self> {
        Ok(match command {
            Command::New {
                title,
                description,
                priority,
                status,
            } => Self::New(CreateTaskInput::new(title, description, priority)?.with_status(status)),
            Command::Edit {
                task,
                title,
                description,
                priority,
                status,
            } => {
                let patch = TaskPatch {
                    title,
                    description,
                    priority,
                    completed: None,
                    status,
                }
                .validate()?;
                if patch.is_empty() {
                    bail!("nothing to change: pass at least one of --title, --description, --priority, --status");
                }
                Self::Edit { task, patch }
            }
            Command::Rm { task } => Self::Rm(task),
            Command::Done { task, undo } => Self::Done {
                task,
                completed: !undo,
            },
            Command::Move { task, status } => Self::Move { task, status },
            Command::Ls {
                priority,
                status,
                completed,
                pending,
                search,
                sort,
                order,
                format,
            } => Self::Ls(LsArgs {
                priority,
                status,
                completed: match (completed, pending) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                search,
                sort,
                order,
                format,
            }),
            Command::Board { priority } => Self::Board(priority),
            Command::Stats { format } => Self::Stats(format),
            Command::Watch { board } => Self::Watch { board },
        })
    }

    async fn execute(self, board: &Board, state: BoardState) -> Result<()> {
        match self {
            Self::New(input) => handlers::handle_new(board, input).await,
            Self::Edit { task, patch } => {
                let id = resolve_task(&state, &task)?;
                handlers::handle_edit(board, &id, patch).await
            }
            Self::Rm(task) => {
                let id = resolve_task(&state, &task)?;
                handlers::handle_rm(board, &id).await
            }
            Self::Done { task, completed } => {
                let id = resolve_task(&state, &task)?;
                handlers::handle_done(board, &id, completed).await
            }
            Self::Move { task, status } => {
                let id = resolve_task(&state, &task)?;
                handlers::handle_move(board, &id, status).await
            }
            Self::Ls(args) => handlers::handle_ls(board, args),
            Self::Board(priority) => {
                handlers::handle_board(&state, priority);
                Ok(())
            }
            Self::Stats(format) => handlers::handle_stats(&state, format),
            Self::Watch { board: kanban } => handlers::handle_watch(board, kanban).await,
        }
    }
}

/// Resolve a full id or a unique id prefix against the snapshot.
///
/// Unmatched input is passed through so the store reports it.
fn resolve_task(state: &BoardState, raw: &str) -> Result<TaskId> {
    let raw = raw.trim();
    if let Some(exact) = state.raw.iter().find(|task| task.id.as_str() == raw) {
        return Ok(exact.id.clone());
    }
    let mut matches = state
        .raw
        .iter()
        .filter(|task| task.id.as_str().starts_with(raw))
        .map(|task| &task.id);
    match (matches.next(), matches.next()) {
        (Some(id), None) => Ok(id.clone()),
        (Some(_), Some(_)) => bail!("task id prefix '{raw}' is ambiguous"),
        (None, _) => TaskId::new(raw).with_context(|| format!("Invalid task id: {raw}")),
    }
}
