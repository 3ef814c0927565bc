//! SQLite-backed task store.
//!
//! One `tasks` table keyed by an autoincrement integer id. rusqlite is blocking,
//! so every statement runs on tokio's blocking pool. Each statement is its own
//! implicit transaction, which means it is committed when the call returns.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{StoreError, StoreResult};
use crate::store::TaskStore;
use crate::task::{normalise_name, TaskId, TaskRecord};

/// `AUTOINCREMENT` keeps SQLite from handing out the id of a deleted last row again.
const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_name TEXT NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0
);";

/// Rebuild a `tasks` table created without `AUTOINCREMENT`, keeping every row
/// and its id. Run inside a transaction.
const MIGRATE_TO_AUTOINCREMENT: &str = "
CREATE TABLE tasks_new (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_name TEXT NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0
);
INSERT INTO tasks_new (id, task_name, completed)
    SELECT id, COALESCE(task_name, ''), COALESCE(completed, 0) FROM tasks;
DROP TABLE tasks;
ALTER TABLE tasks_new RENAME TO tasks;
";

/// Create the `tasks` table, or upgrade one from an older layout.
fn prepare_schema(conn: &mut Connection) -> StoreResult<()> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'tasks'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        None => conn.execute_batch(SCHEMA)?,
        Some(sql) if sql.to_ascii_uppercase().contains("AUTOINCREMENT") => {}
        Some(_) => {
            tracing::info!("migrating tasks table to autoincrement ids");
            let tx = conn.transaction()?;
            tx.execute_batch(MIGRATE_TO_AUTOINCREMENT)?;
            tx.commit()?;
        }
    }
    Ok(())
}

/// Task store over a single SQLite connection.
pub struct SqliteStore {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path` and ensure the schema exists.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        let path = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> StoreResult<Connection> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let mut conn = Connection::open(&path)?;
            prepare_schema(&mut conn)?;
            tracing::info!(path = %path.display(), "opened sqlite task store");
            Ok(conn)
        })
        .await??;
        Ok(Self::from_connection(conn))
    }

    /// A private, non-persistent database. Used by tests and dry runs.
    pub fn open_in_memory() -> StoreResult<Self> {
        let mut conn = Connection::open_in_memory()?;
        prepare_schema(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        SqliteStore {
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            f(conn)
        })
        .await?
    }
}

/// Map "zero rows touched" to `NotFound`.
fn expect_row(changed: usize, id: TaskId) -> StoreResult<()> {
    if changed == 0 {
        Err(StoreError::NotFound(id))
    } else {
        Ok(())
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn create_task(&self, name: &str) -> StoreResult<TaskId> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tasks (task_name, completed) VALUES (?1, 0)",
                params![name],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn update_task_name(&self, id: TaskId, name: &str) -> StoreResult<()> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE tasks SET task_name = ?1 WHERE id = ?2",
                params![name, id],
            )?;
            expect_row(changed, id)
        })
        .await
    }

    async fn update_task_completion(&self, id: TaskId, completed: bool) -> StoreResult<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE tasks SET completed = ?1 WHERE id = ?2",
                params![i64::from(completed), id],
            )?;
            expect_row(changed, id)
        })
        .await
    }

    async fn delete_task(&self, id: TaskId) -> StoreResult<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            expect_row(changed, id)
        })
        .await
    }

    async fn load_all(&self) -> StoreResult<Vec<TaskRecord>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, task_name, completed FROM tasks ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, TaskId>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<i64>>(2)?.unwrap_or(0) != 0,
                ))
            })?;

            let mut tasks = Vec::new();
            for row in rows {
                let (id, name, completed) = row?;
                // Rows migrated from older databases may carry blank names.
                match name.as_deref().and_then(normalise_name) {
                    Some(name) => tasks.push(TaskRecord {
                        id,
                        name: name.to_string(),
                        completed,
                    }),
                    None => tracing::warn!(id, "skipping stored task with a blank name"),
                }
            }
            Ok(tasks)
        })
        .await
    }

    async fn close(&self) -> StoreResult<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || match conn.lock().take() {
            Some(conn) => conn.close().map_err(|(_, e)| StoreError::from(e)),
            None => Ok(()),
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.create_task("Buy milk").await.unwrap(), 1);
        assert_eq!(store.create_task("Walk dog").await.unwrap(), 2);

        let tasks = store.load_all().await.unwrap();
        assert_eq!(
            tasks,
            vec![TaskRecord::new(1, "Buy milk"), TaskRecord::new(2, "Walk dog")]
        );
    }

    #[tokio::test]
    async fn test_updates_are_visible_in_load_all() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.create_task("Draft").await.unwrap();
        store.update_task_name(id, "Final").await.unwrap();
        store.update_task_completion(id, true).await.unwrap();

        let tasks = store.load_all().await.unwrap();
        assert_eq!(tasks[0].name, "Final");
        assert!(tasks[0].completed);
    }

    #[tokio::test]
    async fn test_missing_id_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.update_task_name(42, "x").await,
            Err(StoreError::NotFound(42))
        ));
        assert!(matches!(
            store.update_task_completion(42, true).await,
            Err(StoreError::NotFound(42))
        ));
        assert!(matches!(store.delete_task(42).await, Err(StoreError::NotFound(42))));
    }

    #[tokio::test]
    async fn test_deleted_ids_are_not_reused() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_task("one").await.unwrap();
        let second = store.create_task("two").await.unwrap();
        store.delete_task(second).await.unwrap();
        let third = store.create_task("three").await.unwrap();
        assert!(third > second);
    }

    #[tokio::test]
    async fn test_reopen_keeps_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("todo.db");

        let store = SqliteStore::open(&path).await.unwrap();
        let id = store.create_task("persist me").await.unwrap();
        store.update_task_completion(id, true).await.unwrap();
        store.close().await.unwrap();

        let reopened = SqliteStore::open(&path).await.unwrap();
        let tasks = reopened.load_all().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "persist me");
        assert!(tasks[0].completed);
    }

    fn legacy_database(path: &Path, rows: &[(TaskId, Option<&str>, bool)]) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE tasks (id INTEGER PRIMARY KEY, task_name TEXT, completed BOOLEAN);",
        )
        .unwrap();
        for (id, name, completed) in rows {
            conn.execute(
                "INSERT INTO tasks (id, task_name, completed) VALUES (?1, ?2, ?3)",
                params![id, name, completed],
            )
            .unwrap();
        }
    }

    fn table_sql(path: &Path) -> String {
        Connection::open(path)
            .unwrap()
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'tasks'",
                [],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_legacy_table_is_migrated_and_ids_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.db");
        legacy_database(&path, &[(1, Some("a"), false), (2, Some("b"), true)]);

        let store = SqliteStore::open(&path).await.unwrap();
        assert!(table_sql(&path).contains("AUTOINCREMENT"));
        assert_eq!(
            store.load_all().await.unwrap(),
            vec![
                TaskRecord::new(1, "a"),
                TaskRecord { id: 2, name: "b".into(), completed: true },
            ]
        );

        store.delete_task(2).await.unwrap();
        let next = store.create_task("c").await.unwrap();
        assert_eq!(next, 3);
        store.close().await.unwrap();

        // A migrated database opens without being rebuilt again.
        let reopened = SqliteStore::open(&path).await.unwrap();
        let names: Vec<_> = reopened.load_all().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_blank_stored_names_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.db");
        legacy_database(
            &path,
            &[(1, Some("keep"), false), (2, None, false), (3, Some("   "), true)],
        );

        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(store.load_all().await.unwrap(), vec![TaskRecord::new(1, "keep")]);
        // Skipped rows still hold their ids.
        assert_eq!(store.create_task("new").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.close().await.unwrap();
        assert!(matches!(store.create_task("late").await, Err(StoreError::Closed)));
        assert!(matches!(store.load_all().await, Err(StoreError::Closed)));
        // Closing twice is harmless.
        store.close().await.unwrap();
    }
}
