//! SQLite-backed task store.
//!
//! Each task row carries its free-form fields as a single JSON text column,
//! so the table schema never changes when the forms grow new inputs.

use super::{now_string, StoreError, Task, TaskDraft, TaskStore};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY NOT NULL,
    fields TEXT NOT NULL DEFAULT '{}',
    completed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at DESC);
"#;

pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    pub async fn new(data_dir: PathBuf) -> Result<Self, StoreError> {
        let db_path = data_dir.join("tasks.db");

        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| StoreError::new(format!("Failed to create data dir: {}", e)))?;

        // Open database in blocking task
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)
                .map_err(|e| StoreError::new(format!("Failed to open SQLite database: {}", e)))?;

            conn.execute_batch(SCHEMA)
                .map_err(|e| StoreError::new(format!("Failed to run schema: {}", e)))?;

            Ok::<_, StoreError>(conn)
        })
        .await
        .map_err(|e| StoreError::new(format!("Task join error: {}", e)))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn row_to_task(
    id_str: String,
    fields_json: String,
    completed: i32,
    created_at: String,
) -> Result<Task, StoreError> {
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| StoreError::new(format!("Corrupt task id {:?}: {}", id_str, e)))?;
    let fields: BTreeMap<String, String> = serde_json::from_str(&fields_json)
        .map_err(|e| StoreError::new(format!("Corrupt fields document for {}: {}", id, e)))?;
    Ok(Task {
        id,
        fields,
        completed: completed != 0,
        created_at,
    })
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(
                    "SELECT id, fields, completed, created_at
                     FROM tasks
                     ORDER BY created_at DESC",
                )
                .map_err(|e| StoreError::new(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i32>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .map_err(|e| StoreError::new(e.to_string()))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::new(e.to_string()))?;

            rows.into_iter()
                .map(|(id, fields, completed, created_at)| {
                    row_to_task(id, fields, completed, created_at)
                })
                .collect()
        })
        .await
        .map_err(|e| StoreError::new(e.to_string()))?
    }

    async fn get(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let conn = self.conn.clone();
        let id_str = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let row = conn
                .query_row(
                    "SELECT id, fields, completed, created_at FROM tasks WHERE id = ?1",
                    params![&id_str],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i32>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()
                .map_err(|e| StoreError::new(e.to_string()))?;

            row.map(|(id, fields, completed, created_at)| {
                row_to_task(id, fields, completed, created_at)
            })
            .transpose()
        })
        .await
        .map_err(|e| StoreError::new(e.to_string()))?
    }

    async fn create(&self, draft: TaskDraft) -> Result<Task, StoreError> {
        let task = Task {
            id: Uuid::new_v4(),
            fields: draft.fields,
            completed: draft.completed,
            created_at: now_string(),
        };

        let conn = self.conn.clone();
        let row = task.clone();
        tokio::task::spawn_blocking(move || {
            let fields_json = serde_json::to_string(&row.fields)
                .map_err(|e| StoreError::new(format!("Failed to serialize fields: {}", e)))?;
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO tasks (id, fields, completed, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    row.id.to_string(),
                    fields_json,
                    row.completed as i32,
                    row.created_at
                ],
            )
            .map_err(|e| StoreError::new(e.to_string()))?;
            Ok::<_, StoreError>(())
        })
        .await
        .map_err(|e| StoreError::new(e.to_string()))??;

        Ok(task)
    }

    async fn update(&self, id: Uuid, draft: TaskDraft) -> Result<bool, StoreError> {
        let conn = self.conn.clone();
        let id_str = id.to_string();
        tokio::task::spawn_blocking(move || {
            let fields_json = serde_json::to_string(&draft.fields)
                .map_err(|e| StoreError::new(format!("Failed to serialize fields: {}", e)))?;
            let conn = conn.blocking_lock();
            let changed = conn
                .execute(
                    "UPDATE tasks SET fields = ?1, completed = ?2 WHERE id = ?3",
                    params![fields_json, draft.completed as i32, id_str],
                )
                .map_err(|e| StoreError::new(e.to_string()))?;
            Ok(changed > 0)
        })
        .await
        .map_err(|e| StoreError::new(e.to_string()))?
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let conn = self.conn.clone();
        let id_str = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute("DELETE FROM tasks WHERE id = ?1", params![id_str])
                .map_err(|e| StoreError::new(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::new(e.to_string()))?
    }
}
