use std::borrow::Cow;

use taskboard_core::{BoardColumn, Task, TaskStats, TaskStatus};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use unicode_segmentation::UnicodeSegmentation;

const TITLE_WIDTH: usize = 40;
const CARD_WIDTH: usize = 48;

pub fn print_task_table(tasks: &[Task]) {
    println!("ID | Status | Priority | Done | Title | Created");
    println!("-- | ------ | -------- | ---- | ----- | -------");

    for task in tasks {
        println!(
            "{} | {} | {} | {} | {} | {}",
            task.id,
            task.status.label(),
            task.priority.label(),
            if task.completed { "yes" } else { "no" },
            truncate_with_ellipsis(&task.title, TITLE_WIDTH),
            format_timestamp(task.created_at),
        );
    }
}

pub fn print_task(task: &Task) {
    println!("  title:       {}", task.title);
    if !task.description.is_empty() {
        println!("  description: {}", task.description);
    }
    println!("  priority:    {}", task.priority.label());
    println!("  status:      {}", task.status.label());
    println!("  completed:   {}", task.completed);
    println!("  updated:     {}", format_timestamp(task.updated_at));
}

pub fn print_board(columns: &[BoardColumn<'_>]) {
    for (index, column) in columns.iter().enumerate() {
        if index > 0 {
            println!();
        }
        println!("{} {} ({})", column.column.marker, column.column.title, column.cards.len());
        if column.cards.is_empty() {
            println!("  (empty)");
        }
        for task in &column.cards {
            let done = if task.completed && task.status != TaskStatus::Completed {
                " ✓"
            } else {
                ""
            };
            println!(
                "  - [{}] {}{done}  {}",
                task.priority.label(),
                truncate_with_ellipsis(&task.title, CARD_WIDTH),
                task.id
            );
        }
    }
}

pub fn print_stats(stats: &TaskStats) {
    println!("Total:         {}", stats.total);
    println!("Completed:     {}", stats.completed);
    println!("Pending:       {}", stats.pending);
    println!("High priority: {}", stats.high_priority);
    let columns: Vec<_> = TaskStatus::ALL
        .iter()
        .map(|status| format!("{}: {}", status.label(), stats.by_status.get(*status)))
        .collect();
    println!("{}", columns.join(" | "));
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| "-".to_owned())
}

fn truncate_with_ellipsis(input: &str, max_graphemes: usize) -> Cow<'_, str> {
    const ELLIPSIS: &str = "...";
    const ELLIPSIS_GRAPHEMES: usize = 3;

    let grapheme_count = input.graphemes(true).count();
    if grapheme_count <= max_graphemes {
        return Cow::Borrowed(input);
    }
    if max_graphemes <= ELLIPSIS_GRAPHEMES {
        return Cow::Owned(input.graphemes(true).take(max_graphemes).collect());
    }

    let mut truncated: String = input.graphemes(true).take(max_graphemes - ELLIPSIS_GRAPHEMES).collect();
    truncated.push_str(ELLIPSIS);
    Cow::Owned(truncated)
}
