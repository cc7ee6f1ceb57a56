//! In-memory task store (non-persistent).

use super::{now_string, StoreError, Task, TaskDraft, TaskStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct MemoryTaskStore {
    tasks: Arc<RwLock<HashMap<Uuid, Task>>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn create(&self, draft: TaskDraft) -> Result<Task, StoreError> {
        let task = Task {
            id: Uuid::new_v4(),
            fields: draft.fields,
            completed: draft.completed,
            created_at: now_string(),
        };
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update(&self, id: Uuid, draft: TaskDraft) -> Result<bool, StoreError> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&id) {
            Some(task) => {
                task.fields = draft.fields;
                task.completed = draft.completed;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.tasks.write().await.remove(&id);
        Ok(())
    }
}
