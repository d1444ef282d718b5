use chrono::Utc;
use rusqlite::OptionalExtension;
use std::collections::HashMap;

use crate::db::Database;
use crate::error::CoreError;
use crate::models::tool_call::{ToolCall, ToolCallStatus};

/// Field updates applied together with a status transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionPatch {
    pub output: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub set_completed_at: bool,
}

enum TransitionOutcome {
    Applied(Box<ToolCall>),
    NotFound,
    Invalid(ToolCallStatus),
}

#[derive(Clone)]
pub struct ToolCallStore {
    db: Database,
}

impl ToolCallStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, call: &ToolCall) -> Result<(), CoreError> {
        let c = call.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO tool_calls (id, execution_id, node_execution_id, tool_name, input, output, status, error_message, started_at, completed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     ON CONFLICT(id) DO UPDATE SET
                       output = excluded.output,
                       status = excluded.status,
                       error_message = excluded.error_message,
                       completed_at = excluded.completed_at",
                    rusqlite::params![
                        c.id,
                        c.execution_id,
                        c.node_execution_id,
                        c.tool_name,
                        serde_json::to_string(&c.input).unwrap_or_default(),
                        c.output.map(|v| serde_json::to_string(&v).unwrap_or_default()),
                        c.status.as_str(),
                        c.error_message,
                        c.started_at.map(|t| t.timestamp_millis()),
                        c.completed_at.map(|t| t.timestamp_millis()),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, tool_call_id: &str) -> Result<Option<ToolCall>, CoreError> {
        let id = tool_call_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM tool_calls WHERE id = ?1",
                    COLUMNS
                ))?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_tool_call(row)))
                    .optional()
            })
            .await
    }

    /// Validate and apply a status transition in a single connection
    /// closure, so transitions are atomic per call id. Racing writers
    /// resolve last-writer-wins at this layer.
    pub async fn transition(
        &self,
        tool_call_id: &str,
        to: ToolCallStatus,
        patch: TransitionPatch,
    ) -> Result<ToolCall, CoreError> {
        let id = tool_call_id.to_string();
        let now = Utc::now().timestamp_millis();
        let outcome = self
            .db
            .with_conn_async(move |conn| {
                let current: Option<ToolCall> = conn
                    .prepare(&format!("SELECT {} FROM tool_calls WHERE id = ?1", COLUMNS))?
                    .query_row(rusqlite::params![id], |row| Ok(row_to_tool_call(row)))
                    .optional()?;

                let current = match current {
                    Some(c) => c,
                    None => return Ok(TransitionOutcome::NotFound),
                };
                if !ToolCallStatus::can_transition(current.status, to) {
                    return Ok(TransitionOutcome::Invalid(current.status));
                }

                let completed_at = if patch.set_completed_at {
                    Some(now)
                } else {
                    current.completed_at.map(|t| t.timestamp_millis())
                };
                conn.execute(
                    "UPDATE tool_calls SET status = ?1, output = COALESCE(?2, output),
                     error_message = COALESCE(?3, error_message), completed_at = ?4
                     WHERE id = ?5",
                    rusqlite::params![
                        to.as_str(),
                        patch
                            .output
                            .as_ref()
                            .map(|v| serde_json::to_string(v).unwrap_or_default()),
                        patch.error_message,
                        completed_at,
                        id,
                    ],
                )?;

                let updated = conn
                    .prepare(&format!("SELECT {} FROM tool_calls WHERE id = ?1", COLUMNS))?
                    .query_row(rusqlite::params![id], |row| Ok(row_to_tool_call(row)))?;
                Ok(TransitionOutcome::Applied(Box::new(updated)))
            })
            .await?;

        match outcome {
            TransitionOutcome::Applied(call) => Ok(*call),
            TransitionOutcome::NotFound => Err(CoreError::NotFound(format!(
                "Tool call {} not found",
                tool_call_id
            ))),
            TransitionOutcome::Invalid(from) => Err(CoreError::InvalidState(format!(
                "Tool call {} cannot move from {} to {}",
                tool_call_id,
                from.as_str(),
                to.as_str()
            ))),
        }
    }

    /// Tool calls for one execution, oldest first, with pagination.
    pub async fn list_by_execution(
        &self,
        execution_id: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<ToolCall>, CoreError> {
        let id = execution_id.to_string();
        let limit = limit.unwrap_or(100);
        let offset = offset.unwrap_or(0);
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM tool_calls WHERE execution_id = ?1
                     ORDER BY started_at ASC, rowid ASC LIMIT ?2 OFFSET ?3",
                    COLUMNS
                ))?;
                let rows = stmt
                    .query_map(
                        rusqlite::params![id, limit as i64, offset as i64],
                        |row| Ok(row_to_tool_call(row)),
                    )?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn list_by_node(&self, node_execution_id: &str) -> Result<Vec<ToolCall>, CoreError> {
        let id = node_execution_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM tool_calls WHERE node_execution_id = ?1 ORDER BY started_at ASC, rowid ASC",
                    COLUMNS
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![id], |row| Ok(row_to_tool_call(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn list_by_status(
        &self,
        execution_id: &str,
        status: ToolCallStatus,
    ) -> Result<Vec<ToolCall>, CoreError> {
        let id = execution_id.to_string();
        let status_str = status.as_str().to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM tool_calls WHERE execution_id = ?1 AND status = ?2
                     ORDER BY started_at ASC, rowid ASC",
                    COLUMNS
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![id, status_str], |row| {
                        Ok(row_to_tool_call(row))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// Raw counts per status string for one execution. Absent statuses
    /// are filled in by the gate.
    pub async fn count_by_status(
        &self,
        execution_id: &str,
    ) -> Result<HashMap<String, u64>, CoreError> {
        let id = execution_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT status, COUNT(*) FROM tool_calls WHERE execution_id = ?1 GROUP BY status",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![id], |row| {
                        Ok((
                            row.get::<_, String>(0).unwrap_or_default(),
                            row.get::<_, i64>(1).unwrap_or(0) as u64,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows.into_iter().collect())
            })
            .await
    }
}

const COLUMNS: &str =
    "id, execution_id, node_execution_id, tool_name, input, output, status, error_message, started_at, completed_at";

fn row_to_tool_call(row: &rusqlite::Row<'_>) -> ToolCall {
    let input_json: String = row.get(4).unwrap_or_default();
    let output_json: Option<String> = row.get(5).unwrap_or(None);
    ToolCall {
        id: row.get(0).unwrap_or_default(),
        execution_id: row.get(1).unwrap_or_default(),
        node_execution_id: row.get(2).unwrap_or(None),
        tool_name: row.get(3).unwrap_or_default(),
        input: serde_json::from_str(&input_json).unwrap_or(serde_json::Value::Null),
        output: output_json.and_then(|s| serde_json::from_str(&s).ok()),
        status: ToolCallStatus::from_str(&row.get::<_, String>(6).unwrap_or_default())
            .unwrap_or(ToolCallStatus::Pending),
        error_message: row.get(7).unwrap_or(None),
        started_at: row
            .get::<_, Option<i64>>(8)
            .unwrap_or(None)
            .and_then(chrono::DateTime::from_timestamp_millis),
        completed_at: row
            .get::<_, Option<i64>>(9)
            .unwrap_or(None)
            .and_then(chrono::DateTime::from_timestamp_millis),
    }
}
