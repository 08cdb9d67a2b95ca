use std::cmp::Ordering;
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::Task;

/// Field used to order the derived view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    /// Creation timestamp.
    #[default]
    CreatedAt,
    /// Numeric priority level (high first when ascending).
    Priority,
    /// Title, compared case-insensitively.
    Title,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

/// Error returned when a sort token is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid sort {kind}: {token}")]
pub struct UnknownSort {
    kind: &'static str,
    token: String,
}

impl FromStr for SortField {
    type Err = UnknownSort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        match normalized.as_str() {
            "createdat" | "created" | "date" => Ok(Self::CreatedAt),
            "priority" => Ok(Self::Priority),
            "title" => Ok(Self::Title),
            _ => Err(UnknownSort {
                kind: "field",
                token: s.to_owned(),
            }),
        }
    }
}

impl FromStr for SortDirection {
    type Err = UnknownSort;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            _ => Err(UnknownSort {
                kind: "direction",
                token: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreatedAt => "createdAt",
            Self::Priority => "priority",
            Self::Title => "title",
        })
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

/// Ordering applied to the derived view. Defaults to newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TaskSort {
    /// Field to compare.
    pub field: SortField,
    /// Direction of the comparison.
    pub direction: SortDirection,
}

impl TaskSort {
    /// Build a sort specification.
    #[must_use]
    pub const fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Column-header behaviour: picking the active field while ascending flips
    /// to descending, anything else selects `field` ascending.
    #[must_use]
    pub fn toggled(self, field: SortField) -> Self {
        let direction = if self.field == field && self.direction == SortDirection::Asc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        Self { field, direction }
    }

    /// Compare two tasks. Equal keys compare equal so stable sorts keep collection order.
    #[must_use]
    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let ordering = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Priority => a.priority.level().cmp(&b.priority.level()),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// Stable in-place sort.
    pub fn sort(&self, tasks: &mut [&Task]) {
        tasks.sort_by(|a, b| self.compare(a, b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::TaskId;
    use crate::priority::Priority;
    use crate::status::TaskStatus;
    use time::{Duration, OffsetDateTime};

    fn task(id: &str, title: &str, priority: Priority, created_offset: i64) -> Task {
        let created_at = OffsetDateTime::UNIX_EPOCH + Duration::seconds(created_offset);
        Task {
            id: TaskId::new(id).unwrap_or_else(|err| panic!("valid id: {err}")),
            title: title.into(),
            description: String::new(),
            priority,
            completed: false,
            status: TaskStatus::Todo,
            created_at,
            updated_at: created_at,
        }
    }

    fn sorted_ids(tasks: &[Task], sort: TaskSort) -> Vec<String> {
        let mut refs: Vec<&Task> = tasks.iter().collect();
        sort.sort(&mut refs);
        refs.iter().map(|task| task.id.to_string()).collect()
    }

    #[test]
    fn created_at_desc_is_newest_first() {
        let tasks = vec![
            task("t2", "b", Priority::Low, 20),
            task("t3", "c", Priority::Low, 10),
            task("t1", "a", Priority::Low, 30),
        ];
        assert_eq!(sorted_ids(&tasks, TaskSort::default()), ["t1", "t2", "t3"]);
        assert_eq!(
            sorted_ids(&tasks, TaskSort::new(SortField::CreatedAt, SortDirection::Asc)),
            ["t3", "t2", "t1"]
        );
    }

    #[test]
    fn priority_ties_keep_collection_order_in_both_directions() {
        let tasks = vec![
            task("a", "x", Priority::Low, 0),
            task("b", "x", Priority::High, 0),
            task("c", "x", Priority::Low, 0),
            task("d", "x", Priority::High, 0),
        ];
        assert_eq!(
            sorted_ids(&tasks, TaskSort::new(SortField::Priority, SortDirection::Asc)),
            ["b", "d", "a", "c"]
        );
        assert_eq!(
            sorted_ids(&tasks, TaskSort::new(SortField::Priority, SortDirection::Desc)),
            ["a", "c", "b", "d"]
        );
    }

    #[test]
    fn title_sort_ignores_case_and_stays_stable() {
        let tasks = vec![
            task("1", "beta", Priority::Low, 0),
            task("2", "Alpha", Priority::Low, 0),
            task("3", "BETA", Priority::Low, 0),
            task("4", "gamma", Priority::Low, 0),
        ];
        assert_eq!(
            sorted_ids(&tasks, TaskSort::new(SortField::Title, SortDirection::Asc)),
            ["2", "1", "3", "4"]
        );
        assert_eq!(
            sorted_ids(&tasks, TaskSort::new(SortField::Title, SortDirection::Desc)),
            ["4", "1", "3", "2"]
        );
    }

    #[test]
    fn toggled_follows_header_clicks() {
        let sort = TaskSort::default();
        let by_title = sort.toggled(SortField::Title);
        assert_eq!(by_title, TaskSort::new(SortField::Title, SortDirection::Asc));
        assert_eq!(
            by_title.toggled(SortField::Title),
            TaskSort::new(SortField::Title, SortDirection::Desc)
        );
        assert_eq!(
            TaskSort::new(SortField::Title, SortDirection::Desc).toggled(SortField::Title),
            TaskSort::new(SortField::Title, SortDirection::Asc)
        );
    }

    #[test]
    fn tokens_parse() {
        assert_eq!("created-at".parse::<SortField>(), Ok(SortField::CreatedAt));
        assert_eq!("Priority".parse::<SortField>(), Ok(SortField::Priority));
        assert_eq!("DESC".parse::<SortDirection>(), Ok(SortDirection::Desc));
        assert!("size".parse::<SortField>().is_err());
    }
}
