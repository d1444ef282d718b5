use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::CoreError;
use crate::models::execution::{Execution, ExecutionStatus, NodeExecution, NodeStatus};

#[derive(Clone)]
pub struct ExecutionStore {
    db: Database,
}

impl ExecutionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, execution: &Execution) -> Result<(), CoreError> {
        let e = execution.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO executions (id, workflow_id, status, iteration, error, started_at, completed_at, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT(id) DO UPDATE SET
                       status = excluded.status,
                       iteration = excluded.iteration,
                       error = excluded.error,
                       started_at = excluded.started_at,
                       completed_at = excluded.completed_at,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        e.id,
                        e.workflow_id,
                        e.status.as_str(),
                        e.iteration,
                        e.error,
                        e.started_at.map(|t| t.timestamp_millis()),
                        e.completed_at.map(|t| t.timestamp_millis()),
                        e.created_at.timestamp_millis(),
                        e.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, execution_id: &str) -> Result<Option<Execution>, CoreError> {
        let id = execution_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, workflow_id, status, iteration, error, started_at, completed_at, created_at, updated_at
                     FROM executions WHERE id = ?1",
                )?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_execution(row)))
                    .optional()
            })
            .await
    }

    pub async fn list_by_workflow(&self, workflow_id: &str) -> Result<Vec<Execution>, CoreError> {
        let wf_id = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, workflow_id, status, iteration, error, started_at, completed_at, created_at, updated_at
                     FROM executions WHERE workflow_id = ?1 ORDER BY created_at DESC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![wf_id], |row| Ok(row_to_execution(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// Delete an execution and everything hanging off it: node executions
    /// cascade through the schema, checkpoints and tool calls by id.
    pub async fn delete(&self, execution_id: &str) -> Result<bool, CoreError> {
        let id = execution_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "DELETE FROM checkpoints WHERE execution_id = ?1",
                    rusqlite::params![id],
                )?;
                conn.execute(
                    "DELETE FROM tool_calls WHERE execution_id = ?1",
                    rusqlite::params![id],
                )?;
                let changed = conn.execute(
                    "DELETE FROM executions WHERE id = ?1",
                    rusqlite::params![id],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    pub async fn save_node(&self, node: &NodeExecution) -> Result<(), CoreError> {
        let n = node.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO node_executions (id, execution_id, step_id, attempt, status, output, error, started_at, completed_at, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                     ON CONFLICT(id) DO UPDATE SET
                       status = excluded.status,
                       output = excluded.output,
                       error = excluded.error,
                       started_at = excluded.started_at,
                       completed_at = excluded.completed_at,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        n.id,
                        n.execution_id,
                        n.step_id,
                        n.attempt,
                        n.status.as_str(),
                        n.output,
                        n.error,
                        n.started_at.map(|t| t.timestamp_millis()),
                        n.completed_at.map(|t| t.timestamp_millis()),
                        n.created_at.timestamp_millis(),
                        n.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get_node(&self, node_id: &str) -> Result<Option<NodeExecution>, CoreError> {
        let id = node_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, execution_id, step_id, attempt, status, output, error, started_at, completed_at, created_at, updated_at
                     FROM node_executions WHERE id = ?1",
                )?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_node(row)))
                    .optional()
            })
            .await
    }

    /// All node executions for one execution, oldest first, so the latest
    /// attempt for a step is the last row seen for it.
    pub async fn list_nodes(&self, execution_id: &str) -> Result<Vec<NodeExecution>, CoreError> {
        let id = execution_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, execution_id, step_id, attempt, status, output, error, started_at, completed_at, created_at, updated_at
                     FROM node_executions WHERE execution_id = ?1 ORDER BY created_at ASC, rowid ASC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![id], |row| Ok(row_to_node(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }
}

fn row_to_execution(row: &rusqlite::Row<'_>) -> Execution {
    Execution {
        id: row.get(0).unwrap_or_default(),
        workflow_id: row.get(1).unwrap_or_default(),
        status: ExecutionStatus::from_str(&row.get::<_, String>(2).unwrap_or_default())
            .unwrap_or(ExecutionStatus::Pending),
        iteration: row.get(3).unwrap_or(0),
        error: row.get(4).unwrap_or(None),
        started_at: row
            .get::<_, Option<i64>>(5)
            .unwrap_or(None)
            .and_then(chrono::DateTime::from_timestamp_millis),
        completed_at: row
            .get::<_, Option<i64>>(6)
            .unwrap_or(None)
            .and_then(chrono::DateTime::from_timestamp_millis),
        created_at: chrono::DateTime::from_timestamp_millis(row.get(7).unwrap_or(0))
            .unwrap_or_else(Utc::now),
        updated_at: chrono::DateTime::from_timestamp_millis(row.get(8).unwrap_or(0))
            .unwrap_or_else(Utc::now),
    }
}

fn row_to_node(row: &rusqlite::Row<'_>) -> NodeExecution {
    NodeExecution {
        id: row.get(0).unwrap_or_default(),
        execution_id: row.get(1).unwrap_or_default(),
        step_id: row.get(2).unwrap_or_default(),
        attempt: row.get(3).unwrap_or(1),
        status: NodeStatus::from_str(&row.get::<_, String>(4).unwrap_or_default())
            .unwrap_or(NodeStatus::Pending),
        output: row.get(5).unwrap_or(None),
        error: row.get(6).unwrap_or(None),
        started_at: row
            .get::<_, Option<i64>>(7)
            .unwrap_or(None)
            .and_then(chrono::DateTime::from_timestamp_millis),
        completed_at: row
            .get::<_, Option<i64>>(8)
            .unwrap_or(None)
            .and_then(chrono::DateTime::from_timestamp_millis),
        created_at: chrono::DateTime::from_timestamp_millis(row.get(9).unwrap_or(0))
            .unwrap_or_else(Utc::now),
        updated_at: chrono::DateTime::from_timestamp_millis(row.get(10).unwrap_or(0))
            .unwrap_or_else(Utc::now),
    }
}
