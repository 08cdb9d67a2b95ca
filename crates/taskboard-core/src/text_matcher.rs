use crate::task::Task;

/// Case-insensitive substring matcher over a task's title and description.
#[derive(Debug, Clone)]
pub struct TextMatcher {
    needle: String,
}

impl TextMatcher {
    /// Normalize a query string into a matcher. Returns `None` for blank inputs.
    #[must_use]
    pub fn new(query: &str) -> Option<Self> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            needle: trimmed.to_lowercase(),
        })
    }

    /// Determine whether the title or the description contains the query.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.matches_field(&task.title) || self.matches_field(&task.description)
    }

    fn matches_field(&self, value: &str) -> bool {
        value.to_lowercase().contains(&self.needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::TaskId;
    use crate::priority::Priority;
    use crate::status::TaskStatus;
    use time::OffsetDateTime;

    fn task(title: &str, description: &str) -> Task {
        Task {
            id: TaskId::new("t").unwrap_or_else(|err| panic!("valid id: {err}")),
            title: title.into(),
            description: description.into(),
            priority: Priority::Medium,
            completed: false,
            status: TaskStatus::Todo,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn matcher_skips_blank_queries() {
        assert!(TextMatcher::new("").is_none());
        assert!(TextMatcher::new("   ").is_none());
        assert!(TextMatcher::new("\n").is_none());
    }

    #[test]
    fn matcher_searches_title_and_description() {
        let task = task("Improve CLI", "Refactor FILTERS");

        let matcher = TextMatcher::new("cli").unwrap_or_else(|| panic!("matcher must exist"));
        assert!(matcher.matches(&task));

        let matcher = TextMatcher::new("filters").unwrap_or_else(|| panic!("matcher must exist"));
        assert!(matcher.matches(&task));

        let missing = TextMatcher::new("api").unwrap_or_else(|| panic!("matcher must exist"));
        assert!(!missing.matches(&task));
    }

    #[test]
    fn matcher_folds_non_ascii_case() {
        let task = task("Überprüfen", "Straße");
        let matcher = TextMatcher::new("überPRÜFEN").unwrap_or_else(|| panic!("matcher must exist"));
        assert!(matcher.matches(&task));
    }
}
