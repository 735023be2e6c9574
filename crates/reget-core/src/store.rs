//! SQLite-backed task store
//!
//! One `tasks` table holds every download's identity and persisted progress.
//! The pool is shared by all worker jobs and the control thread; sqlx
//! serializes the interleaved writes.

use crate::error::RegetError;
use reget_types::{Task, TaskStatus};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};

/// Database pool for task persistence.
#[derive(Clone, Debug)]
pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    /// Open (creating if missing) the database at `db_path`.
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, RegetError> {
        let path = db_path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                target TEXT NOT NULL,
                status TEXT NOT NULL,
                last_byte INTEGER NOT NULL DEFAULT 0,
                total_bytes INTEGER NOT NULL DEFAULT -1
            );
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Insert a new task (`NEW`, 0 bytes, unknown total) and return its id.
    pub async fn create(&self, url: &str, target: &Path) -> Result<i64, RegetError> {
        let result = sqlx::query(
            "INSERT INTO tasks (url, target, status, last_byte, total_bytes) \
             VALUES (?, ?, 'NEW', 0, -1)",
        )
        .bind(url)
        .bind(target.to_string_lossy().to_string())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        if id <= 0 {
            return Err(RegetError::Storage("no row id assigned".into()));
        }
        Ok(id)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Task>, RegetError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_task).transpose()
    }

    /// Record progress for an in-flight transfer.
    ///
    /// A progress update is proof of liveness, so the status is forced back
    /// to RUNNING as a side effect. Callers on the transfer path absorb
    /// failures from this method rather than aborting the stream.
    pub async fn update_progress(
        &self,
        id: i64,
        bytes_written: i64,
        total_bytes: i64,
    ) -> Result<(), RegetError> {
        sqlx::query("UPDATE tasks SET last_byte = ?, total_bytes = ?, status = 'RUNNING' WHERE id = ?")
            .bind(bytes_written)
            .bind(total_bytes)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Record an authoritative status change. Leaves `total_bytes` untouched.
    pub async fn update_status(
        &self,
        id: i64,
        status: TaskStatus,
        last_byte: i64,
    ) -> Result<(), RegetError> {
        sqlx::query("UPDATE tasks SET status = ?, last_byte = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(last_byte)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// All tasks, ordered by id ascending.
    pub async fn list_all(&self) -> Result<Vec<Task>, RegetError> {
        let rows = sqlx::query("SELECT * FROM tasks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_task).collect()
    }

    /// A window of the same ordering: at most `limit` tasks starting at
    /// `offset`. Negative arguments clamp to 0.
    pub async fn list_range(&self, offset: i64, limit: i64) -> Result<Vec<Task>, RegetError> {
        let rows = sqlx::query("SELECT * FROM tasks ORDER BY id LIMIT ? OFFSET ?")
            .bind(limit.max(0))
            .bind(offset.max(0))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_task).collect()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_task(row: SqliteRow) -> Result<Task, RegetError> {
    let status_str: String = row.get("status");
    let status = TaskStatus::parse(&status_str)
        .ok_or_else(|| RegetError::Storage(format!("unknown task status: {status_str}")))?;

    Ok(Task {
        id: row.get("id"),
        url: row.get("url"),
        target: PathBuf::from(row.get::<String, _>("target")),
        status,
        last_byte: row.get("last_byte"),
        total_bytes: row.get("total_bytes"),
    })
}
