//! Derived, read-only projections of the mirrored collection.

use serde::Serialize;

use crate::filter::TaskFilter;
use crate::priority::Priority;
use crate::sort::TaskSort;
use crate::status::TaskStatus;
use crate::task::Task;

/// Filter then sort `tasks` without touching the input.
///
/// The result only depends on the arguments: identical inputs yield identical
/// output, and tasks with equal sort keys keep their collection order.
#[must_use]
pub fn derive_view(tasks: &[Task], filter: &TaskFilter, sort: &TaskSort) -> Vec<Task> {
    let mut kept = filter.apply(tasks);
    sort.sort(&mut kept);
    kept.into_iter().cloned().collect()
}

/// Per-column counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    /// Tasks in the todo column.
    pub todo: usize,
    /// Tasks in the in-progress column.
    pub in_progress: usize,
    /// Tasks in the completed column.
    pub completed: usize,
}

impl StatusCounts {
    /// Count for a single status.
    #[must_use]
    pub const fn get(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Todo => self.todo,
            TaskStatus::InProgress => self.in_progress,
            TaskStatus::Completed => self.completed,
        }
    }

    const fn bump(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Todo => self.todo += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Completed => self.completed += 1,
        }
    }
}

/// Aggregate statistics over the whole (unfiltered) collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    /// Number of tasks.
    pub total: usize,
    /// Tasks whose completion flag is set.
    pub completed: usize,
    /// Tasks whose completion flag is not set.
    pub pending: usize,
    /// High-priority tasks that are not completed yet.
    pub high_priority: usize,
    /// Counts per kanban column.
    pub by_status: StatusCounts,
}

impl TaskStats {
    /// Compute statistics for `tasks`.
    #[must_use]
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut stats = Self {
            total: tasks.len(),
            ..Self::default()
        };
        for task in tasks {
            if task.completed {
                stats.completed += 1;
            } else if task.priority == Priority::High {
                stats.high_priority += 1;
            }
            stats.by_status.bump(task.status);
        }
        stats.pending = stats.total - stats.completed;
        stats
    }
}
