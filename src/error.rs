//! Structured error types for task list operations.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input rejected before reaching storage.
    ValidationError,

    /// Underlying read/write failure (disk, corruption, migration).
    StorageFailure,

    InternalError,
}

/// Structured error returned from gateway calls and mutation requests.
///
/// Clone so the last failure can be broadcast to observers.
#[derive(Debug, Clone, Serialize, Error)]
#[error("{message}")]
pub struct TodoError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl TodoError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    // Convenience constructors

    pub fn blank_title() -> Self {
        Self::new(ErrorCode::ValidationError, "title must not be blank").with_field("title")
    }

    pub fn storage(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::StorageFailure, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }

    pub fn is_validation(&self) -> bool {
        self.code == ErrorCode::ValidationError
    }

    pub fn is_storage(&self) -> bool {
        self.code == ErrorCode::StorageFailure
    }
}

impl From<rusqlite::Error> for TodoError {
    fn from(err: rusqlite::Error) -> Self {
        TodoError::storage(err)
    }
}

impl From<refinery::Error> for TodoError {
    fn from(err: refinery::Error) -> Self {
        TodoError::storage(err)
    }
}

impl From<tokio::task::JoinError> for TodoError {
    fn from(err: tokio::task::JoinError) -> Self {
        TodoError::internal(err)
    }
}

// The db layer speaks anyhow; anything it raises is a storage problem unless
// it already carries a TodoError.
impl From<anyhow::Error> for TodoError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<TodoError>() {
            Ok(todo_err) => todo_err,
            Err(err) => TodoError::storage(format!("{:#}", err)),
        }
    }
}

/// Result type for task list operations.
pub type TodoResult<T> = std::result::Result<T, TodoError>;

/// Reject empty or whitespace-only titles.
pub fn validate_title(title: &str) -> TodoResult<()> {
    if title.trim().is_empty() {
        return Err(TodoError::blank_title());
    }
    Ok(())
}
