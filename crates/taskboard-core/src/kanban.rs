//! Kanban columns and drag-and-drop semantics.

use crate::id::TaskId;
use crate::priority::Priority;
use crate::status::TaskStatus;
use crate::task::Task;
use crate::task_patch::TaskPatch;

/// Static definition of a board column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KanbanColumn {
    /// Status represented by the column; also the drop target id.
    pub id: TaskStatus,
    /// Column heading.
    pub title: &'static str,
    /// Short marker shown next to the heading.
    pub marker: &'static str,
}

/// Columns in display order.
pub const KANBAN_COLUMNS: [KanbanColumn; 3] = [
    KanbanColumn {
        id: TaskStatus::Todo,
        title: "Todo",
        marker: "□",
    },
    KanbanColumn {
        id: TaskStatus::InProgress,
        title: "In Progress",
        marker: "→",
    },
    KanbanColumn {
        id: TaskStatus::Completed,
        title: "Completed",
        marker: "✓",
    },
];

/// Tasks grouped under their column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardColumn<'a> {
    /// Column definition.
    pub column: KanbanColumn,
    /// Cards in collection order.
    pub cards: Vec<&'a Task>,
}

/// Group tasks by status, optionally keeping only one priority.
///
/// Every column is present even when empty.
#[must_use]
pub fn group_by_status(tasks: &[Task], priority: Option<Priority>) -> Vec<BoardColumn<'_>> {
    KANBAN_COLUMNS
        .iter()
        .map(|column| BoardColumn {
            column: *column,
            cards: tasks
                .iter()
                .filter(|task| task.status == column.id)
                .filter(|task| priority.is_none_or(|wanted| task.priority == wanted))
                .collect(),
        })
        .collect()
}

/// Outcome of dropping a card on a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// The card already sits in the target column.
    Unchanged,
    /// The card is not part of the current snapshot.
    UnknownCard,
    /// Apply `patch` to `task`.
    Update {
        /// Card that was dragged.
        task: TaskId,
        /// Status change to send.
        patch: TaskPatch,
    },
}

/// Translate a drop of `card` onto `target` into a status update.
///
/// Dropping on the completed column also marks the task completed.
#[must_use]
pub fn resolve_drop(tasks: &[Task], card: &TaskId, target: TaskStatus) -> DropOutcome {
    let Some(task) = tasks.iter().find(|task| &task.id == card) else {
        return DropOutcome::UnknownCard;
    };
    if task.status == target {
        return DropOutcome::Unchanged;
    }
    DropOutcome::Update {
        task: task.id.clone(),
        patch: TaskPatch::move_to(target),
    }
}
