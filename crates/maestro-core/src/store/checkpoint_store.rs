use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::CoreError;
use crate::models::checkpoint::Checkpoint;

#[derive(Clone)]
pub struct CheckpointStore {
    db: Database,
}

impl CheckpointStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CoreError> {
        let c = checkpoint.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO checkpoints (id, execution_id, node_execution_id, checkpoint_type, prompt_message, options, decision, feedback, created_at, decided_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     ON CONFLICT(id) DO UPDATE SET
                       decision = excluded.decision,
                       feedback = excluded.feedback,
                       decided_at = excluded.decided_at",
                    rusqlite::params![
                        c.id,
                        c.execution_id,
                        c.node_execution_id,
                        c.checkpoint_type,
                        c.prompt_message,
                        serde_json::to_string(&c.options).unwrap_or_default(),
                        c.decision,
                        c.feedback,
                        c.created_at.timestamp_millis(),
                        c.decided_at.map(|t| t.timestamp_millis()),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>, CoreError> {
        let id = checkpoint_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, execution_id, node_execution_id, checkpoint_type, prompt_message, options, decision, feedback, created_at, decided_at
                     FROM checkpoints WHERE id = ?1",
                )?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_checkpoint(row)))
                    .optional()
            })
            .await
    }

    /// All checkpoints for an execution, newest first.
    pub async fn list_by_execution(
        &self,
        execution_id: &str,
    ) -> Result<Vec<Checkpoint>, CoreError> {
        let id = execution_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, execution_id, node_execution_id, checkpoint_type, prompt_message, options, decision, feedback, created_at, decided_at
                     FROM checkpoints WHERE execution_id = ?1 ORDER BY created_at DESC, rowid DESC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![id], |row| Ok(row_to_checkpoint(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// The most recently created undecided checkpoint for an execution.
    pub async fn latest_pending(
        &self,
        execution_id: &str,
    ) -> Result<Option<Checkpoint>, CoreError> {
        let id = execution_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, execution_id, node_execution_id, checkpoint_type, prompt_message, options, decision, feedback, created_at, decided_at
                     FROM checkpoints WHERE execution_id = ?1 AND decided_at IS NULL
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                )?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_checkpoint(row)))
                    .optional()
            })
            .await
    }

    /// The most recent checkpoint attached to one node execution, decided
    /// or not.
    pub async fn latest_for_node(
        &self,
        node_execution_id: &str,
    ) -> Result<Option<Checkpoint>, CoreError> {
        let id = node_execution_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, execution_id, node_execution_id, checkpoint_type, prompt_message, options, decision, feedback, created_at, decided_at
                     FROM checkpoints WHERE node_execution_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                )?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_checkpoint(row)))
                    .optional()
            })
            .await
    }
}

fn row_to_checkpoint(row: &rusqlite::Row<'_>) -> Checkpoint {
    let options_json: String = row.get(5).unwrap_or_default();
    Checkpoint {
        id: row.get(0).unwrap_or_default(),
        execution_id: row.get(1).unwrap_or_default(),
        node_execution_id: row.get(2).unwrap_or(None),
        checkpoint_type: row.get(3).unwrap_or_default(),
        prompt_message: row.get(4).unwrap_or(None),
        options: serde_json::from_str(&options_json).unwrap_or_default(),
        decision: row.get(6).unwrap_or(None),
        feedback: row.get(7).unwrap_or(None),
        created_at: chrono::DateTime::from_timestamp_millis(row.get(8).unwrap_or(0))
            .unwrap_or_else(Utc::now),
        decided_at: row
            .get::<_, Option<i64>>(9)
            .unwrap_or(None)
            .and_then(chrono::DateTime::from_timestamp_millis),
    }
}
