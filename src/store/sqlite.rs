//! SQLite-based task store.

use super::{StoreError, Task, TaskStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    info TEXT NOT NULL,
    date TEXT NOT NULL,
    is_completed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_tasks_date ON tasks(date);
"#;

const SELECT_TASK: &str = "SELECT id, info, date, is_completed FROM tasks";

pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    pub async fn open(db_path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Other(format!("Failed to create database dir: {}", e))
            })?;
        }

        // Open database in blocking task
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(SCHEMA)?;
            Ok::<_, rusqlite::Error>(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    ///
    /// The lock guard lives only inside the closure, so the connection is
    /// released on every exit path.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let conn = self.conn.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut *conn)
        })
        .await?;
        Ok(result?)
    }
}

fn row_to_task(row: &Row<'_>) -> Result<Task, rusqlite::Error> {
    let date: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Task {
        id: row.get(0)?,
        info: row.get(1)?,
        date,
        is_completed: row.get::<_, i64>(3)? != 0,
    })
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn add_tasks_on(
        &self,
        tasks: &[String],
        date: NaiveDate,
    ) -> Result<Vec<Task>, StoreError> {
        let tasks = tasks.to_vec();
        self.with_conn(move |conn| {
            // Dropping an uncommitted transaction rolls it back.
            let tx = conn.transaction()?;
            let mut inserted = Vec::with_capacity(tasks.len());
            {
                let mut stmt =
                    tx.prepare("INSERT INTO tasks (info, date, is_completed) VALUES (?1, ?2, 0)")?;
                for info in tasks {
                    stmt.execute(params![info, date_key(date)])?;
                    inserted.push(Task {
                        id: tx.last_insert_rowid(),
                        info,
                        date,
                        is_completed: false,
                    });
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await
    }

    async fn count_completed_on(&self, date: NaiveDate) -> Result<i64, StoreError> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT COUNT(id) FROM tasks WHERE date = ?1 AND is_completed = 1",
                params![date_key(date)],
                |row| row.get(0),
            )
        })
        .await
    }

    async fn list_all_tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_TASK))?;
            let tasks = stmt
                .query_map([], row_to_task)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await
    }

    async fn list_tasks_on(&self, date: NaiveDate) -> Result<Vec<Task>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!("{} WHERE date = ?1 ORDER BY id", SELECT_TASK))?;
            let tasks = stmt
                .query_map(params![date_key(date)], row_to_task)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await
    }

    async fn set_completed(&self, id: i64) -> Result<bool, StoreError> {
        let changed = self
            .with_conn(move |conn| {
                conn.execute("UPDATE tasks SET is_completed = 1 WHERE id = ?1", params![id])
            })
            .await?;
        if changed == 0 {
            tracing::debug!("set_completed: no task with id {}", id);
        }
        Ok(changed > 0)
    }
}
