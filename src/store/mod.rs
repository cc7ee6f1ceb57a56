//! Task document storage with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `sqlite`: SQLite database storing each task as a JSON document row

mod memory;
mod sqlite;

pub use memory::MemoryTaskStore;
pub use sqlite::SqliteTaskStore;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// A stored task document.
///
/// `fields` holds whatever the submitted form contained (title, description,
/// and anything else the views add over time). `completed` is kept out of
/// `fields` so it is always a strict boolean, never the raw checkbox value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub fields: BTreeMap<String, String>,
    pub completed: bool,
    /// RFC3339 timestamp, assigned by the store on create.
    pub created_at: String,
}

/// The writable portion of a task, as it arrives from a form submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub fields: BTreeMap<String, String>,
    pub completed: bool,
}

impl TaskDraft {
    /// Build a draft from raw form fields.
    ///
    /// HTML checkboxes submit the literal string `"on"` when checked and are
    /// absent otherwise; the raw value never reaches storage. Everything else
    /// is kept verbatim as a document field.
    pub fn from_form(mut form: BTreeMap<String, String>) -> Self {
        let completed = form
            .remove("completed")
            .is_some_and(|v| v == "on");
        Self {
            fields: form,
            completed,
        }
    }
}

/// A failed persistence operation.
///
/// Connection errors, constraint violations, and serialization problems all
/// collapse into this one kind; callers only decide between "worked" and
/// "did not", and the message is for the log, not the user.
#[derive(Debug, Error)]
#[error("task store failure: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Get current timestamp as RFC3339 string.
///
/// RFC3339 with a fixed UTC offset sorts lexicographically, which the sqlite
/// backend relies on for `ORDER BY created_at DESC`.
pub fn now_string() -> String {
    Utc::now().to_rfc3339()
}

/// Task store trait - implemented by all storage backends.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    /// List all tasks, ordered by created_at descending.
    async fn list(&self) -> Result<Vec<Task>, StoreError>;

    /// Get a single task by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Create a new task from a draft; the store assigns id and created_at.
    async fn create(&self, draft: TaskDraft) -> Result<Task, StoreError>;

    /// Replace the writable portion of a task.
    ///
    /// Returns `Ok(false)` when no task matched the id.
    async fn update(&self, id: Uuid, draft: TaskDraft) -> Result<bool, StoreError>;

    /// Delete a task. Deleting an unknown id is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

/// Task store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStoreKind {
    Memory,
    #[default]
    Sqlite,
}

impl TaskStoreKind {
    /// Parse from environment variable value.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "memory" => Self::Memory,
            "sqlite" | "db" => Self::Sqlite,
            _ => Self::default(),
        }
    }
}

/// Create a task store based on kind and data directory.
pub async fn create_task_store(
    kind: TaskStoreKind,
    data_dir: PathBuf,
) -> Result<Arc<dyn TaskStore>, StoreError> {
    match kind {
        TaskStoreKind::Memory => Ok(Arc::new(MemoryTaskStore::new())),
        TaskStoreKind::Sqlite => {
            let store = SqliteTaskStore::new(data_dir).await?;
            Ok(Arc::new(store))
        }
    }
}
