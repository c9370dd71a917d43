//! Core types for the task list.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Storage-assigned task identifier.
pub type TaskId = i64;

/// A persisted to-do item.
///
/// `completion_date` is only ever present while `is_completed` is true. The
/// constructors and [`Task::toggled`] / [`Task::with_details`] keep that
/// invariant; nothing else in the crate builds a completed task by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// `None` until the store assigns one on insert.
    pub id: Option<TaskId>,
    pub title: String,
    pub is_completed: bool,
    /// Milliseconds since epoch.
    pub deadline: Option<i64>,
    /// Milliseconds since epoch.
    pub completion_date: Option<i64>,
}

impl Task {
    /// A fresh, not yet persisted task.
    pub fn new(title: impl Into<String>, deadline: Option<i64>) -> Self {
        Self {
            id: None,
            title: title.into(),
            is_completed: false,
            deadline,
            completion_date: None,
        }
    }

    /// Copy with the completion flag flipped.
    ///
    /// Completing stamps `now_ms` as the completion date, reopening clears it.
    pub fn toggled(&self, now_ms: i64) -> Self {
        let is_completed = !self.is_completed;
        Self {
            is_completed,
            completion_date: is_completed.then_some(now_ms),
            ..self.clone()
        }
    }

    /// Copy with title and deadline replaced; completion state is carried over.
    pub fn with_details(&self, title: impl Into<String>, deadline: Option<i64>) -> Self {
        Self {
            title: title.into(),
            deadline,
            ..self.clone()
        }
    }
}

/// View mode for the task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Filter {
    #[default]
    All,
    /// Not completed.
    Active,
    Completed,
}

impl Filter {
    /// Filters in tab order.
    pub const ALL_FILTERS: [Filter; 3] = [Filter::All, Filter::Active, Filter::Completed];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "all" => Some(Filter::All),
            "active" | "open" => Some(Filter::Active),
            "completed" | "done" => Some(Filter::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Active => "active",
            Filter::Completed => "completed",
        }
    }

    /// Human-readable tab label.
    pub fn label(&self) -> &'static str {
        match self {
            Filter::All => "All",
            Filter::Active => "Active",
            Filter::Completed => "Completed",
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !task.is_completed,
            Filter::Completed => task.is_completed,
        }
    }

    /// Project a full set onto this filter, preserving order.
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        tasks.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable full set of tasks as emitted by the store, newest id first.
///
/// Cheap to clone; carries an id index so lookups do not scan the list.
#[derive(Debug, Clone, Default)]
pub struct TaskSnapshot {
    tasks: Arc<Vec<Task>>,
    by_id: Arc<HashMap<TaskId, usize>>,
}

impl TaskSnapshot {
    pub fn new(tasks: Vec<Task>) -> Self {
        let by_id = tasks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.id.map(|id| (id, i)))
            .collect();
        Self {
            tasks: Arc::new(tasks),
            by_id: Arc::new(by_id),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.by_id.get(&id).map(|&i| &self.tasks[i])
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Derive the displayed list from a full set and a filter.
pub fn derive(snapshot: &TaskSnapshot, filter: Filter) -> Vec<Task> {
    filter.apply(snapshot.tasks())
}
