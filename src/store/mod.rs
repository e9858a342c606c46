//! Task storage module with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `sqlite`: SQLite database

mod memory;
mod sqlite;

pub use memory::InMemoryTaskStore;
pub use sqlite::SqliteTaskStore;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::DatabaseTarget;

/// A persisted task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub info: String,
    pub date: NaiveDate,
    pub is_completed: bool,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Other(String),
}

/// Current calendar date in the server's local time zone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Task store trait - implemented by all storage backends.
///
/// Every method is one transactional unit.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    /// Insert one incomplete task per string, all dated `date`.
    ///
    /// All-or-nothing: if any insert fails, none of the batch is kept.
    async fn add_tasks_on(&self, tasks: &[String], date: NaiveDate)
        -> Result<Vec<Task>, StoreError>;

    /// Count completed tasks dated `date`.
    async fn count_completed_on(&self, date: NaiveDate) -> Result<i64, StoreError>;

    /// Every task, ordered by id.
    async fn list_all_tasks(&self) -> Result<Vec<Task>, StoreError>;

    /// Tasks dated `date`, ordered by id.
    async fn list_tasks_on(&self, date: NaiveDate) -> Result<Vec<Task>, StoreError>;

    /// Mark a task completed. Returns `false` (not an error) when no task has that id.
    async fn set_completed(&self, id: i64) -> Result<bool, StoreError>;

    /// Insert tasks dated today.
    async fn add_tasks(&self, tasks: &[String]) -> Result<Vec<Task>, StoreError> {
        self.add_tasks_on(tasks, today()).await
    }

    /// Count tasks completed today.
    async fn count_completed_today(&self) -> Result<i64, StoreError> {
        self.count_completed_on(today()).await
    }
}

/// Open the store described by `target`.
pub async fn open_store(target: &DatabaseTarget) -> Result<Arc<dyn TaskStore>, StoreError> {
    match target {
        DatabaseTarget::Memory => {
            tracing::warn!("Using in-memory task store; tasks are lost on restart");
            Ok(Arc::new(InMemoryTaskStore::new()))
        }
        DatabaseTarget::Sqlite(path) => {
            let store = SqliteTaskStore::open(path.clone()).await?;
            tracing::info!("Opened task database at {}", path.display());
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn stores() -> (Vec<Arc<dyn TaskStore>>, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let sqlite = SqliteTaskStore::open(dir.path().join("tasks.db"))
            .await
            .expect("Failed to open sqlite store");
        let stores: Vec<Arc<dyn TaskStore>> =
            vec![Arc::new(InMemoryTaskStore::new()), Arc::new(sqlite)];
        (stores, dir)
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn added_tasks_are_listed_incomplete_and_dated_today() {
        let (stores, _dir) = stores().await;
        for store in stores {
            let input = strings(&["Wash dishes", "Do homework", "Go for a walk"]);
            let inserted = store.add_tasks(&input).await.unwrap();
            assert_eq!(inserted.len(), 3);

            let listed = store.list_all_tasks().await.unwrap();
            let mut infos: Vec<String> = listed.iter().map(|t| t.info.clone()).collect();
            infos.sort();
            let mut expected = input.clone();
            expected.sort();
            assert_eq!(infos, expected);
            assert!(listed.iter().all(|t| !t.is_completed));
            assert!(listed.iter().all(|t| t.date == today()));
        }
    }

    #[tokio::test]
    async fn ids_increase_across_batches() {
        let (stores, _dir) = stores().await;
        for store in stores {
            let first = store.add_tasks(&strings(&["a", "b"])).await.unwrap();
            let second = store.add_tasks(&strings(&["c"])).await.unwrap();
            let ids: Vec<i64> = first.iter().chain(second.iter()).map(|t| t.id).collect();
            assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids: {:?}", ids);
        }
    }

    #[tokio::test]
    async fn set_completed_on_missing_id_is_a_no_op() {
        let (stores, _dir) = stores().await;
        for store in stores {
            store.add_tasks(&strings(&["a"])).await.unwrap();
            let before = store.list_all_tasks().await.unwrap();

            let updated = store.set_completed(9_999).await.unwrap();

            assert!(!updated);
            assert_eq!(store.list_all_tasks().await.unwrap(), before);
        }
    }

    #[tokio::test]
    async fn completing_today_task_raises_energy_by_one() {
        let (stores, _dir) = stores().await;
        for store in stores {
            let tasks = store.add_tasks(&strings(&["a", "b"])).await.unwrap();
            assert_eq!(store.count_completed_today().await.unwrap(), 0);

            assert!(store.set_completed(tasks[0].id).await.unwrap());
            assert_eq!(store.count_completed_today().await.unwrap(), 1);

            // Completing twice changes nothing.
            assert!(store.set_completed(tasks[0].id).await.unwrap());
            assert_eq!(store.count_completed_today().await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn completing_other_day_task_leaves_energy_unchanged() {
        let (stores, _dir) = stores().await;
        for store in stores {
            let yesterday = today() - Duration::days(1);
            let old = store
                .add_tasks_on(&strings(&["yesterday's chore"]), yesterday)
                .await
                .unwrap();

            store.set_completed(old[0].id).await.unwrap();

            assert_eq!(store.count_completed_today().await.unwrap(), 0);
            assert_eq!(store.count_completed_on(yesterday).await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn list_tasks_on_filters_by_date() {
        let (stores, _dir) = stores().await;
        for store in stores {
            let yesterday = today() - Duration::days(1);
            store
                .add_tasks_on(&strings(&["old"]), yesterday)
                .await
                .unwrap();
            store.add_tasks(&strings(&["new"])).await.unwrap();

            let todays = store.list_tasks_on(today()).await.unwrap();
            assert_eq!(todays.len(), 1);
            assert_eq!(todays[0].info, "new");
            assert_eq!(store.list_all_tasks().await.unwrap().len(), 2);
        }
    }

    #[tokio::test]
    async fn empty_batch_inserts_nothing() {
        let (stores, _dir) = stores().await;
        for store in stores {
            assert!(store.add_tasks(&[]).await.unwrap().is_empty());
            assert!(store.list_all_tasks().await.unwrap().is_empty());
        }
    }
}
