//! Transfer tasks

use serde::{Deserialize, Serialize};
use stagecopy_types::Category;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new task ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One file to copy.
///
/// A task value is never mutated once queued; a failed attempt produces a new
/// value through [`Task::with_failure`] carrying the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    category: Category,
    source: PathBuf,
    destination: PathBuf,
    attempts: u32,
    last_error: Option<String>,
}

impl Task {
    /// Create a task that has not been attempted yet
    pub fn new<S: Into<PathBuf>, D: Into<PathBuf>>(
        category: Category,
        source: S,
        destination: D,
    ) -> Self {
        Self {
            id: TaskId::new(),
            category,
            source: source.into(),
            destination: destination.into(),
            attempts: 0,
            last_error: None,
        }
    }

    /// Task identifier, stable across retries
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Category the source file was classified into
    pub fn category(&self) -> Category {
        self.category
    }

    /// File to read
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// File to write
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Directory that must exist before the copy
    pub fn destination_dir(&self) -> Option<&Path> {
        self.destination
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    /// Number of failed attempts so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reason of the most recent failure
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The task as it stands after one more failed attempt
    pub fn with_failure<S: Into<String>>(&self, reason: S) -> Self {
        Self {
            attempts: self.attempts.saturating_add(1),
            last_error: Some(reason.into()),
            ..self.clone()
        }
    }
}
