//! Domain types and pure view logic for taskboard.
//!
//! Nothing in this crate performs I/O: the store adapter produces [`Task`]
//! values, and everything here derives filtered, sorted, grouped, or counted
//! projections from them.

/// Filter predicates.
pub mod filter;
/// Identifier types.
pub mod id;
/// Kanban board columns and drop handling.
pub mod kanban;
/// Priority levels.
pub mod priority;
/// Sort specification.
pub mod sort;
/// Workflow status.
pub mod status;
/// Task entity and create input.
pub mod task;
/// Partial task updates.
pub mod task_patch;
/// Free-text search.
pub mod text_matcher;
/// Derived list view and statistics.
pub mod view;

pub use filter::{FieldUpdate, FilterUpdate, TaskFilter};
pub use id::TaskId;
pub use kanban::{BoardColumn, DropOutcome, KANBAN_COLUMNS, KanbanColumn, group_by_status, resolve_drop};
pub use priority::Priority;
pub use sort::{SortDirection, SortField, TaskSort};
pub use status::TaskStatus;
pub use task::{CreateTaskInput, Task, ValidationError};
pub use task_patch::{TaskEditData, TaskPatch};
pub use text_matcher::TextMatcher;
pub use view::{StatusCounts, TaskStats, derive_view};
