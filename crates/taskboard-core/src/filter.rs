use serde::{Deserialize, Serialize};

use crate::priority::Priority;
use crate::status::TaskStatus;
use crate::task::Task;
use crate::text_matcher::TextMatcher;

/// Conjunctive predicates applied to the mirrored collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Keep tasks with exactly this priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Keep tasks in this kanban column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// Keep tasks whose completion flag equals this value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// Case-insensitive substring searched in title and description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl TaskFilter {
    /// Filter that keeps everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Require a status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Require a completion flag.
    #[must_use]
    pub const fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Configure the search text. Whitespace-only input disables the search.
    #[must_use]
    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search = normalize_search(text.into());
        self
    }

    /// Returns true when no predicate is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.priority.is_none()
            && self.status.is_none()
            && self.completed.is_none()
            && self.search.as_deref().and_then(TextMatcher::new).is_none()
    }

    /// Evaluate every active predicate against a single task.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        let matcher = self.search.as_deref().and_then(TextMatcher::new);
        self.matches_with(task, matcher.as_ref())
    }

    /// Keep the tasks satisfying every active predicate, preserving input order.
    pub fn apply<'a, I>(&self, tasks: I) -> Vec<&'a Task>
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let matcher = self.search.as_deref().and_then(TextMatcher::new);
        tasks
            .into_iter()
            .filter(|task| self.matches_with(task, matcher.as_ref()))
            .collect()
    }

    /// Merge a partial update into this filter.
    pub fn merge(&mut self, update: FilterUpdate) {
        let FilterUpdate {
            priority,
            status,
            completed,
            search,
        } = update;
        priority.apply_to(&mut self.priority);
        status.apply_to(&mut self.status);
        completed.apply_to(&mut self.completed);
        search.apply_to(&mut self.search);
        self.search = self.search.take().and_then(normalize_search);
    }

    fn matches_with(&self, task: &Task, matcher: Option<&TextMatcher>) -> bool {
        self.priority.is_none_or(|priority| task.priority == priority)
            && self.status.is_none_or(|status| task.status == status)
            && self.completed.is_none_or(|completed| task.completed == completed)
            && matcher.is_none_or(|matcher| matcher.matches(task))
    }
}

fn normalize_search(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Change requested for a single filter field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    /// Leave the field as it is.
    #[default]
    Keep,
    /// Activate the predicate with this value.
    Set(T),
    /// Deactivate the predicate.
    Clear,
}

impl<T> FieldUpdate<T> {
    fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Set(value) => *slot = Some(value),
            Self::Clear => *slot = None,
        }
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Clear, Self::Set)
    }
}

/// Partial filter change; untouched fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterUpdate {
    /// Priority predicate change.
    pub priority: FieldUpdate<Priority>,
    /// Status predicate change.
    pub status: FieldUpdate<TaskStatus>,
    /// Completion predicate change.
    pub completed: FieldUpdate<bool>,
    /// Search text change.
    pub search: FieldUpdate<String>,
}

impl FilterUpdate {
    /// Update that only touches the priority predicate.
    #[must_use]
    pub fn priority(priority: Option<Priority>) -> Self {
        Self {
            priority: priority.into(),
            ..Self::default()
        }
    }

    /// Update that only touches the status predicate.
    #[must_use]
    pub fn status(status: Option<TaskStatus>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }

    /// Update that only touches the completion predicate.
    #[must_use]
    pub fn completed(completed: Option<bool>) -> Self {
        Self {
            completed: completed.into(),
            ..Self::default()
        }
    }

    /// Update that only touches the search text.
    #[must_use]
    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search: FieldUpdate::Set(text.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::TaskId;
    use time::OffsetDateTime;

    fn task(id: &str, title: &str, priority: Priority, status: TaskStatus, completed: bool) -> Task {
        Task {
            id: TaskId::new(id).unwrap_or_else(|err| panic!("valid id: {err}")),
            title: title.into(),
            description: format!("{title} details"),
            priority,
            completed,
            status,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn sample() -> Vec<Task> {
        vec![
            task("a", "Write report", Priority::High, TaskStatus::Todo, false),
            task("b", "Review report", Priority::High, TaskStatus::Completed, true),
            task("c", "Plan sprint", Priority::Low, TaskStatus::InProgress, false),
            task("d", "Fix login", Priority::Medium, TaskStatus::Todo, false),
        ]
    }

    fn ids(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|task| task.id.to_string()).collect()
    }

    #[test]
    fn empty_filter_keeps_everything_in_order() {
        let tasks = sample();
        let filter = TaskFilter::new();
        assert!(filter.is_empty());
        assert_eq!(ids(&filter.apply(&tasks)), ["a", "b", "c", "d"]);
    }

    #[test]
    fn predicates_combine_conjunctively() {
        let tasks = sample();
        let filter = TaskFilter::new()
            .with_priority(Priority::High)
            .with_search("REPORT")
            .with_completed(false);
        let kept = filter.apply(&tasks);
        assert_eq!(ids(&kept), ["a"]);
        assert!(kept.iter().all(|task| filter.matches(task)));
    }

    #[test]
    fn status_and_search_over_description() {
        let tasks = sample();
        let filter = TaskFilter::new().with_status(TaskStatus::Todo).with_search("login details");
        assert_eq!(ids(&filter.apply(&tasks)), ["d"]);
    }

    #[test]
    fn blank_search_is_inactive() {
        let filter = TaskFilter::new().with_search("   ");
        assert!(filter.search.is_none());
        assert!(filter.is_empty());
    }

    #[test]
    fn merge_sets_clears_and_keeps_fields() {
        let mut filter = TaskFilter::new().with_priority(Priority::Low).with_search("plan");
        filter.merge(FilterUpdate::status(Some(TaskStatus::InProgress)));
        assert_eq!(filter.priority, Some(Priority::Low));
        assert_eq!(filter.status, Some(TaskStatus::InProgress));
        assert_eq!(filter.search.as_deref(), Some("plan"));

        filter.merge(FilterUpdate::priority(None));
        assert_eq!(filter.priority, None);

        filter.merge(FilterUpdate::search("  "));
        assert_eq!(filter.search, None);
    }
}
