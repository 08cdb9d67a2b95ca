use crate::priority::Priority;
use crate::status::TaskStatus;
use crate::task::{Task, ValidationError, require_text};

/// Partial update applied to a stored task. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// Overwrite the title.
    pub title: Option<String>,
    /// Overwrite the description.
    pub description: Option<String>,
    /// Overwrite the priority.
    pub priority: Option<Priority>,
    /// Overwrite the completion flag.
    pub completed: Option<bool>,
    /// Move to another kanban column.
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    /// Patch that only flips the completion flag.
    #[must_use]
    pub const fn completion(completed: bool) -> Self {
        Self {
            title: None,
            description: None,
            priority: None,
            completed: Some(completed),
            status: None,
        }
    }

    /// Patch that moves a task to `status`.
    ///
    /// Moving to [`TaskStatus::Completed`] also marks the task completed; other
    /// columns leave the flag as it is.
    #[must_use]
    pub const fn move_to(status: TaskStatus) -> Self {
        Self {
            title: None,
            description: None,
            priority: None,
            completed: match status {
                TaskStatus::Completed => Some(true),
                TaskStatus::Todo | TaskStatus::InProgress => None,
            },
            status: Some(status),
        }
    }

    /// Returns true when no field would change. An empty patch still refreshes `updatedAt`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.completed.is_none()
            && self.status.is_none()
    }

    /// Check that supplied text fields are not blank, trimming them.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] naming the first blank field.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let Self {
            title,
            description,
            priority,
            completed,
            status,
        } = self;
        Ok(Self {
            title: title.map(|value| require_text("title", value)).transpose()?,
            description: description
                .map(|value| require_text("description", value))
                .transpose()?,
            priority,
            completed,
            status,
        })
    }

    /// Compute a patch holding only the fields of `data` that differ from `task`.
    #[must_use]
    pub fn from_task(task: &Task, data: TaskEditData) -> Self {
        let TaskEditData {
            title,
            description,
            priority,
            status,
        } = data;

        Self {
            title: (title != task.title).then_some(title),
            description: (description != task.description).then_some(description),
            priority: (priority != task.priority).then_some(priority),
            completed: (status == TaskStatus::Completed && !task.completed).then_some(true),
            status: (status != task.status).then_some(status),
        }
    }
}

/// Complete set of form fields submitted by an edit form.
#[derive(Debug, Clone)]
pub struct TaskEditData {
    /// Desired title.
    pub title: String,
    /// Desired description.
    pub description: String,
    /// Desired priority.
    pub priority: Priority,
    /// Desired status.
    pub status: TaskStatus,
}

impl TaskEditData {
    /// Prefill the form from an existing task.
    #[must_use]
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            status: task.status,
        }
    }
}
