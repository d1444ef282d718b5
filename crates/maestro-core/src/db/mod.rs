//! SQLite persistence layer for the Maestro engine.
//!
//! Uses rusqlite with WAL mode for concurrent read performance.
//! All database operations are executed via `tokio::task::spawn_blocking`
//! to avoid blocking the async runtime.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::CoreError;

/// Thread-safe handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(db_path: &str) -> Result<Self, CoreError> {
        let path = Path::new(db_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(db_path)
            .map_err(|e| CoreError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| CoreError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_tables()?;

        tracing::info!("SQLite database opened at: {}", db_path);
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Database(format!("Failed to open in-memory db: {}", e)))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| CoreError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_tables()?;
        Ok(db)
    }

    /// Execute a closure with access to the database connection.
    /// Automatically handles locking and error conversion.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CoreError::Database(format!("Lock poisoned: {}", e)))?;
        f(&conn).map_err(|e| CoreError::Database(e.to_string()))
    }

    /// Execute a closure with access to the database connection (async-friendly).
    pub async fn with_conn_async<F, T>(&self, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| CoreError::Database(format!("Task join error: {}", e)))?
    }

    /// Create all tables if they don't exist.
    fn initialize_tables(&self) -> Result<(), CoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS workflows (
                    id              TEXT PRIMARY KEY,
                    name            TEXT NOT NULL,
                    definition      TEXT NOT NULL,
                    is_default      INTEGER NOT NULL DEFAULT 0,
                    created_at      INTEGER NOT NULL,
                    updated_at      INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS executions (
                    id              TEXT PRIMARY KEY,
                    workflow_id     TEXT NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
                    status          TEXT NOT NULL DEFAULT 'pending',
                    iteration       INTEGER NOT NULL DEFAULT 0,
                    error           TEXT,
                    started_at      INTEGER,
                    completed_at    INTEGER,
                    created_at      INTEGER NOT NULL,
                    updated_at      INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_executions_workflow ON executions(workflow_id);

                CREATE TABLE IF NOT EXISTS node_executions (
                    id              TEXT PRIMARY KEY,
                    execution_id    TEXT NOT NULL REFERENCES executions(id) ON DELETE CASCADE,
                    step_id         TEXT NOT NULL,
                    attempt         INTEGER NOT NULL DEFAULT 1,
                    status          TEXT NOT NULL DEFAULT 'pending',
                    output          TEXT,
                    error           TEXT,
                    started_at      INTEGER,
                    completed_at    INTEGER,
                    created_at      INTEGER NOT NULL,
                    updated_at      INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_node_executions_execution ON node_executions(execution_id);

                CREATE TABLE IF NOT EXISTS checkpoints (
                    id                  TEXT PRIMARY KEY,
                    execution_id        TEXT NOT NULL,
                    node_execution_id   TEXT,
                    checkpoint_type     TEXT NOT NULL,
                    prompt_message      TEXT,
                    options             TEXT NOT NULL DEFAULT '[]',
                    decision            TEXT,
                    feedback            TEXT,
                    created_at          INTEGER NOT NULL,
                    decided_at          INTEGER
                );
                CREATE INDEX IF NOT EXISTS idx_checkpoints_execution ON checkpoints(execution_id);

                CREATE TABLE IF NOT EXISTS tool_calls (
                    id                  TEXT PRIMARY KEY,
                    execution_id        TEXT NOT NULL,
                    node_execution_id   TEXT,
                    tool_name           TEXT NOT NULL,
                    input               TEXT NOT NULL DEFAULT 'null',
                    output              TEXT,
                    status              TEXT NOT NULL DEFAULT 'pending',
                    error_message       TEXT,
                    started_at          INTEGER,
                    completed_at        INTEGER
                );
                CREATE INDEX IF NOT EXISTS idx_tool_calls_execution ON tool_calls(execution_id);
                CREATE INDEX IF NOT EXISTS idx_tool_calls_node ON tool_calls(node_execution_id);
                CREATE INDEX IF NOT EXISTS idx_tool_calls_status ON tool_calls(status);

                CREATE TABLE IF NOT EXISTS review_panels (
                    id                  TEXT PRIMARY KEY,
                    node_execution_id   TEXT NOT NULL,
                    execution_id        TEXT NOT NULL,
                    config              TEXT NOT NULL,
                    status              TEXT NOT NULL DEFAULT 'pending',
                    outcome             TEXT,
                    summary             TEXT,
                    error               TEXT,
                    created_at          INTEGER NOT NULL,
                    updated_at          INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_review_panels_execution ON review_panels(execution_id);

                CREATE TABLE IF NOT EXISTS reviewer_votes (
                    id                  TEXT PRIMARY KEY,
                    panel_execution_id  TEXT NOT NULL REFERENCES review_panels(id) ON DELETE CASCADE,
                    reviewer_id         TEXT NOT NULL,
                    vote                TEXT NOT NULL,
                    feedback            TEXT NOT NULL DEFAULT '',
                    issues              TEXT NOT NULL DEFAULT '[]',
                    weight              REAL NOT NULL DEFAULT 1.0,
                    created_at          INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_reviewer_votes_panel ON reviewer_votes(panel_execution_id);
                ",
            )
        })
    }
}
