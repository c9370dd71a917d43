//! Task CRUD.
//!
//! The `*_on` helpers take an existing connection so the gateway can write and
//! re-read the full set under one lock.

use super::Database;
use crate::types::{Task, TaskId};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

const TASK_COLUMNS: &str = "id, title, isCompleted, deadline, completionDate";

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let id: TaskId = row.get("id")?;
    let title: String = row.get("title")?;
    let is_completed: bool = row.get("isCompleted")?;
    let deadline: Option<i64> = row.get("deadline")?;
    let completion_date: Option<i64> = row.get("completionDate")?;

    Ok(Task {
        id: Some(id),
        title,
        is_completed,
        deadline,
        completion_date,
    })
}

/// All tasks, newest id first.
pub fn list_tasks_on(conn: &Connection) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tasks ORDER BY id DESC",
        TASK_COLUMNS
    ))?;
    let tasks = stmt
        .query_map([], parse_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

pub fn get_task_on(conn: &Connection, id: TaskId) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
            params![id],
            parse_task_row,
        )
        .optional()?;
    Ok(task)
}

/// Insert a task and return its id.
///
/// Without an id SQLite assigns the next rowid. With an id that already
/// exists the stored row is replaced.
pub fn insert_task_on(conn: &Connection, task: &Task) -> Result<TaskId> {
    match task.id {
        Some(id) => {
            conn.execute(
                "INSERT OR REPLACE INTO tasks (id, title, isCompleted, deadline, completionDate)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id,
                    task.title,
                    task.is_completed,
                    task.deadline,
                    task.completion_date
                ],
            )?;
            Ok(id)
        }
        None => {
            conn.execute(
                "INSERT INTO tasks (title, isCompleted, deadline, completionDate)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    task.title,
                    task.is_completed,
                    task.deadline,
                    task.completion_date
                ],
            )?;
            Ok(conn.last_insert_rowid())
        }
    }
}

/// Replace the stored row matching `task.id`. Returns false when no row matched.
pub fn update_task_on(conn: &Connection, task: &Task) -> Result<bool> {
    let Some(id) = task.id else {
        return Ok(false);
    };
    let changed = conn.execute(
        "UPDATE tasks SET title = ?1, isCompleted = ?2, deadline = ?3, completionDate = ?4
         WHERE id = ?5",
        params![
            task.title,
            task.is_completed,
            task.deadline,
            task.completion_date,
            id
        ],
    )?;
    Ok(changed > 0)
}

/// Delete the row matching `id`. Returns false when no row matched.
pub fn delete_task_on(conn: &Connection, id: TaskId) -> Result<bool> {
    let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

impl Database {
    /// List every task, newest id first.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.with_conn(list_tasks_on)
    }

    /// Get a task by id.
    pub fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_on(conn, id))
    }

    /// Insert a task, returning the stored id.
    pub fn insert_task(&self, task: &Task) -> Result<TaskId> {
        self.with_conn(|conn| insert_task_on(conn, task))
    }

    /// Update an existing task. Unknown ids are left alone.
    pub fn update_task(&self, task: &Task) -> Result<bool> {
        self.with_conn(|conn| update_task_on(conn, task))
    }

    /// Delete a task by id.
    pub fn delete_task(&self, id: TaskId) -> Result<bool> {
        self.with_conn(|conn| delete_task_on(conn, id))
    }
}
