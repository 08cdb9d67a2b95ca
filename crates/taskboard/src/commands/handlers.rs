use anyhow::{Result, anyhow, bail};
use taskboard_app::BoardState;
use taskboard_core::{
    CreateTaskInput, DropOutcome, Priority, SortDirection, SortField, Task, TaskEditData, TaskFilter, TaskId,
    TaskPatch, TaskSort, TaskStatus, group_by_status,
};
use time::OffsetDateTime;

use super::Board;
use crate::OutputFormat;
use crate::render;

pub struct LsArgs {
    pub priority: Option<Priority>,
    pub status: Option<TaskStatus>,
    pub completed: Option<bool>,
    pub search: Option<String>,
    pub sort: SortField,
    pub order: SortDirection,
    pub format: OutputFormat,
}

pub async fn handle_new(board: &Board, input: CreateTaskInput) -> Result<()> {
    let id = board.create(input).await?;
    let task = refreshed(board, &id, None).await?;
    println!("created task: {id}");
    render::print_task(&task);
    Ok(())
}

pub async fn handle_edit(board: &Board, id: &TaskId, patch: TaskPatch) -> Result<()> {
    let current = board.state().task(id).cloned();
    let patch = changed_fields(current.as_ref(), patch);
    if patch.is_empty() {
        println!("nothing changed for task {id}");
        return Ok(());
    }
    let before = current.map(|task| task.updated_at);
    board.edit(id, patch).await?;
    let task = refreshed(board, id, before).await?;
    println!("updated task: {id}");
    render::print_task(&task);
    Ok(())
}

pub async fn handle_rm(board: &Board, id: &TaskId) -> Result<()> {
    board.remove(id).await?;
    board.wait_until(|state| state.task(id).is_none()).await?;
    println!("deleted task: {id}");
    Ok(())
}

pub async fn handle_done(board: &Board, id: &TaskId, completed: bool) -> Result<()> {
    let before = last_update(board, id);
    board.toggle_complete(id, completed).await?;
    refreshed(board, id, before).await?;
    if completed {
        println!("completed task: {id}");
    } else {
        println!("reopened task: {id}");
    }
    Ok(())
}

pub async fn handle_move(board: &Board, id: &TaskId, status: TaskStatus) -> Result<()> {
    let before = last_update(board, id);
    match board.drop_on_column(id, status).await? {
        DropOutcome::Unchanged => println!("task {id} is already in {}", status.label()),
        DropOutcome::UnknownCard => bail!("task not found: {id}"),
        DropOutcome::Update { .. } => {
            refreshed(board, id, before).await?;
            println!("moved task {id} to {}", status.label());
        }
    }
    Ok(())
}

pub fn handle_ls(board: &Board, args: LsArgs) -> Result<()> {
    let LsArgs {
        priority,
        status,
        completed,
        search,
        sort,
        order,
        format,
    } = args;
    board.replace_filter(TaskFilter {
        priority,
        status,
        completed,
        search,
    });
    board.set_sort(TaskSort::new(sort, order));
    let state = board.state();

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(state.items.as_slice())?);
        return Ok(());
    }
    if state.items.is_empty() {
        if state.filter.is_empty() {
            println!("No tasks found");
        } else {
            println!("No tasks matched the provided filters");
        }
        return Ok(());
    }
    render::print_task_table(&state.items);
    Ok(())
}

pub fn handle_board(state: &BoardState, priority: Option<Priority>) {
    render::print_board(&group_by_status(&state.raw, priority));
}

pub fn handle_stats(state: &BoardState, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => render::print_stats(&state.stats),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state.stats)?),
    }
    Ok(())
}

pub async fn handle_watch(board: &Board, kanban: bool) -> Result<()> {
    let mut changes = board.changes();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut state = changes.borrow_and_update().clone();
    loop {
        render_live(&state, kanban);
        tokio::select! {
            interrupted = &mut ctrl_c => {
                interrupted?;
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                state = changes.borrow_and_update().clone();
                println!();
            }
        }
    }
    Ok(())
}

fn render_live(state: &BoardState, kanban: bool) {
    if let Some(error) = &state.error {
        println!("error: {error}");
    }
    if state.is_loading {
        println!("Loading... ({})", state.connection.state);
        return;
    }
    if kanban {
        render::print_board(&state.columns());
    } else if state.items.is_empty() {
        println!("No tasks found");
    } else {
        render::print_task_table(&state.items);
    }
}

/// Drop fields that already hold the requested value.
fn changed_fields(task: Option<&Task>, patch: TaskPatch) -> TaskPatch {
    let Some(task) = task else {
        return patch;
    };
    let mut form = TaskEditData::from_task(task);
    if let Some(title) = patch.title {
        form.title = title;
    }
    if let Some(description) = patch.description {
        form.description = description;
    }
    if let Some(priority) = patch.priority {
        form.priority = priority;
    }
    if let Some(status) = patch.status {
        form.status = status;
    }
    TaskPatch::from_task(task, form)
}

fn last_update(board: &Board, id: &TaskId) -> Option<OffsetDateTime> {
    board.state().task(id).map(|task| task.updated_at)
}

/// Wait for the snapshot showing a write newer than `before`.
async fn refreshed(board: &Board, id: &TaskId, before: Option<OffsetDateTime>) -> Result<Task> {
    let state = board
        .wait_until(|state| {
            state
                .task(id)
                .is_some_and(|task| before.is_none_or(|before| task.updated_at > before))
        })
        .await?;
    state.task(id).cloned().ok_or_else(|| anyhow!("task not found: {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task {
            id: TaskId::new("t1").unwrap_or_else(|err| panic!("valid id: {err}")),
            title: "Draft".into(),
            description: "body".into(),
            priority: Priority::Low,
            completed: false,
            status: TaskStatus::Todo,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn unchanged_values_are_not_written() {
        let patch = TaskPatch {
            title: Some("Draft".into()),
            priority: Some(Priority::High),
            ..TaskPatch::default()
        };
        let patch = changed_fields(Some(&task()), patch);
        assert_eq!(patch.title, None);
        assert_eq!(patch.priority, Some(Priority::High));
        assert_eq!(patch.description, None);
    }

    #[test]
    fn editing_into_the_completed_column_marks_completion() {
        let patch = changed_fields(Some(&task()), TaskPatch::move_to(TaskStatus::Completed));
        assert_eq!(patch.status, Some(TaskStatus::Completed));
        assert_eq!(patch.completed, Some(true));
        assert!(changed_fields(Some(&task()), TaskPatch::default()).is_empty());
        assert_eq!(changed_fields(None, TaskPatch::completion(true)), TaskPatch::completion(true));
    }
}
