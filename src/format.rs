//! Output formatting for task lists and dates.

use crate::types::{Filter, Task};
use chrono::{Local, NaiveDate, TimeZone};
use serde_json::{Value, json};

/// Display format for dates, e.g. `2026/10/18`.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// Output format for task lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Text,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "text" | "txt" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

/// Format a millisecond timestamp as a local `yyyy/MM/dd` date.
pub fn format_date(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms).earliest() {
        Some(dt) => dt.format(DATE_FORMAT).to_string(),
        None => format!("@{}", ms),
    }
}

/// Parse `yyyy/MM/dd` or `yyyy-MM-dd` into local midnight, in milliseconds.
pub fn parse_date(s: &str) -> Option<i64> {
    let s = s.trim();
    let date = NaiveDate::parse_from_str(s, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

/// One task as a single line: checkbox, id, title, then date labels.
pub fn format_task_line(task: &Task) -> String {
    let check = if task.is_completed { "[x]" } else { "[ ]" };
    let id = task
        .id
        .map(|id| format!("#{}", id))
        .unwrap_or_else(|| "#?".to_string());

    let mut line = format!("{} {} {}", check, id, task.title);

    if let Some(deadline) = task.deadline {
        line.push_str(&format!("  due {}", format_date(deadline)));
    }
    if task.is_completed
        && let Some(done) = task.completion_date
    {
        line.push_str(&format!("  done {}", format_date(done)));
    }

    line
}

/// Format a filtered list with a filter-tab header.
pub fn format_tasks_text(tasks: &[Task], filter: Filter) -> String {
    let tabs: Vec<String> = Filter::ALL_FILTERS
        .iter()
        .map(|f| {
            if *f == filter {
                format!("[{}]", f.label())
            } else {
                f.label().to_string()
            }
        })
        .collect();

    let mut out = format!("{}  ({})\n", tabs.join(" "), tasks.len());
    if tasks.is_empty() {
        out.push_str("  (no tasks)\n");
    }
    for task in tasks {
        out.push_str("  ");
        out.push_str(&format_task_line(task));
        out.push('\n');
    }
    out
}

/// Format a filtered list as JSON.
pub fn format_tasks_json(tasks: &[Task], filter: Filter) -> Value {
    json!({
        "filter": filter,
        "count": tasks.len(),
        "tasks": tasks,
    })
}

/// Render in the requested format.
pub fn format_tasks(tasks: &[Task], filter: Filter, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_tasks_text(tasks, filter),
        OutputFormat::Json => format_tasks_json(tasks, filter).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: i64, title: &str) -> Task {
        Task {
            id: Some(id),
            ..Task::new(title, None)
        }
    }

    #[test]
    fn test_date_roundtrip_local() {
        let ms = parse_date("2026/10/18").unwrap();
        assert_eq!(format_date(ms), "2026/10/18");
        assert_eq!(parse_date("2026-10-18"), Some(ms));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("tomorrow").is_none());
        assert!(parse_date("2026/13/01").is_none());
    }

    #[test]
    fn test_task_line_labels() {
        let due = parse_date("2026/01/02").unwrap();
        let done = parse_date("2026/01/03").unwrap();

        let open = Task {
            deadline: Some(due),
            ..task(1, "Buy milk")
        };
        assert_eq!(format_task_line(&open), "[ ] #1 Buy milk  due 2026/01/02");

        let completed = open.toggled(done);
        assert_eq!(
            format_task_line(&completed),
            "[x] #1 Buy milk  due 2026/01/02  done 2026/01/03"
        );
    }

    #[test]
    fn test_text_list_marks_selected_filter() {
        let out = format_tasks_text(&[task(2, "b"), task(1, "a")], Filter::Active);
        let header = out.lines().next().unwrap();
        assert_eq!(header, "All [Active] Completed  (2)");
        assert!(out.contains("#2 b"));

        let empty = format_tasks_text(&[], Filter::All);
        assert!(empty.contains("(no tasks)"));
    }

    #[test]
    fn test_json_list() {
        let value = format_tasks_json(&[task(1, "a")], Filter::Completed);
        assert_eq!(value["filter"], "COMPLETED");
        assert_eq!(value["count"], 1);
        assert_eq!(value["tasks"][0]["title"], "a");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::from_str("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("text"), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::from_str("md"), None);
    }
}
