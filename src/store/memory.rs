//! In-memory task store (non-persistent).

use super::{StoreError, Task, TaskStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    tasks: Vec<Task>,
    next_id: i64,
}

#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn add_tasks_on(
        &self,
        tasks: &[String],
        date: NaiveDate,
    ) -> Result<Vec<Task>, StoreError> {
        let mut inner = self.inner.write().await;
        let mut inserted = Vec::with_capacity(tasks.len());
        for info in tasks {
            inner.next_id += 1;
            inserted.push(Task {
                id: inner.next_id,
                info: info.clone(),
                date,
                is_completed: false,
            });
        }
        inner.tasks.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn count_completed_on(&self, date: NaiveDate) -> Result<i64, StoreError> {
        let inner = self.inner.read().await;
        let count = inner
            .tasks
            .iter()
            .filter(|t| t.date == date && t.is_completed)
            .count();
        Ok(count as i64)
    }

    async fn list_all_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.inner.read().await.tasks.clone())
    }

    async fn list_tasks_on(&self, date: NaiveDate) -> Result<Vec<Task>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .tasks
            .iter()
            .filter(|t| t.date == date)
            .cloned()
            .collect())
    }

    async fn set_completed(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.is_completed = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
