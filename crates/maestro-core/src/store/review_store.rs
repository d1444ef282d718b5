use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::CoreError;
use crate::models::review::{
    PanelStatus, ReviewConfig, ReviewOutcome, ReviewPanelExecution, ReviewSummary, ReviewerVote,
    VoteKind,
};

#[derive(Clone)]
pub struct ReviewStore {
    db: Database,
}

impl ReviewStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save_panel(&self, panel: &ReviewPanelExecution) -> Result<(), CoreError> {
        let p = panel.clone();
        let config_json = serde_json::to_string(&p.config)
            .map_err(|e| CoreError::Internal(format!("Failed to serialize panel config: {}", e)))?;
        let summary_json = match &p.summary {
            Some(summary) => Some(serde_json::to_string(summary).map_err(|e| {
                CoreError::Internal(format!("Failed to serialize panel summary: {}", e))
            })?),
            None => None,
        };
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO review_panels (id, node_execution_id, execution_id, config, status, outcome, summary, error, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     ON CONFLICT(id) DO UPDATE SET
                       status = excluded.status,
                       outcome = excluded.outcome,
                       summary = excluded.summary,
                       error = excluded.error,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        p.id,
                        p.node_execution_id,
                        p.execution_id,
                        config_json,
                        p.status.as_str(),
                        p.outcome.map(|o| o.as_str()),
                        summary_json,
                        p.error,
                        p.created_at.timestamp_millis(),
                        p.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get_panel(
        &self,
        panel_id: &str,
    ) -> Result<Option<ReviewPanelExecution>, CoreError> {
        let id = panel_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, node_execution_id, execution_id, config, status, outcome, summary, error, created_at, updated_at
                     FROM review_panels WHERE id = ?1",
                )?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_panel(row)))
                    .optional()
            })
            .await
    }

    pub async fn panel_for_node(
        &self,
        node_execution_id: &str,
    ) -> Result<Option<ReviewPanelExecution>, CoreError> {
        let id = node_execution_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, node_execution_id, execution_id, config, status, outcome, summary, error, created_at, updated_at
                     FROM review_panels WHERE node_execution_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                )?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_panel(row)))
                    .optional()
            })
            .await
    }

    pub async fn save_vote(&self, vote: &ReviewerVote) -> Result<(), CoreError> {
        let v = vote.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO reviewer_votes (id, panel_execution_id, reviewer_id, vote, feedback, issues, weight, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        v.id,
                        v.panel_execution_id,
                        v.reviewer_id,
                        v.vote.as_str(),
                        v.feedback,
                        serde_json::to_string(&v.issues).unwrap_or_default(),
                        v.weight,
                        v.created_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Votes for one panel in arrival order.
    pub async fn list_votes(&self, panel_id: &str) -> Result<Vec<ReviewerVote>, CoreError> {
        let id = panel_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, panel_execution_id, reviewer_id, vote, feedback, issues, weight, created_at
                     FROM reviewer_votes WHERE panel_execution_id = ?1 ORDER BY created_at ASC, rowid ASC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![id], |row| Ok(row_to_vote(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn count_votes(&self, panel_id: &str) -> Result<usize, CoreError> {
        let id = panel_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM reviewer_votes WHERE panel_execution_id = ?1",
                    rusqlite::params![id],
                    |row| row.get(0),
                )?;
                Ok(count as usize)
            })
            .await
    }
}

fn row_to_panel(row: &rusqlite::Row<'_>) -> ReviewPanelExecution {
    let config_json: String = row.get(3).unwrap_or_default();
    let summary_json: Option<String> = row.get(6).unwrap_or(None);
    ReviewPanelExecution {
        id: row.get(0).unwrap_or_default(),
        node_execution_id: row.get(1).unwrap_or_default(),
        execution_id: row.get(2).unwrap_or_default(),
        config: serde_json::from_str::<ReviewConfig>(&config_json).unwrap_or_default(),
        status: PanelStatus::from_str(&row.get::<_, String>(4).unwrap_or_default())
            .unwrap_or(PanelStatus::Pending),
        outcome: row
            .get::<_, Option<String>>(5)
            .unwrap_or(None)
            .and_then(|s| ReviewOutcome::from_str(&s)),
        summary: summary_json.and_then(|s| serde_json::from_str::<ReviewSummary>(&s).ok()),
        error: row.get(7).unwrap_or(None),
        created_at: chrono::DateTime::from_timestamp_millis(row.get(8).unwrap_or(0))
            .unwrap_or_else(Utc::now),
        updated_at: chrono::DateTime::from_timestamp_millis(row.get(9).unwrap_or(0))
            .unwrap_or_else(Utc::now),
    }
}

fn row_to_vote(row: &rusqlite::Row<'_>) -> ReviewerVote {
    let issues_json: String = row.get(5).unwrap_or_default();
    ReviewerVote {
        id: row.get(0).unwrap_or_default(),
        panel_execution_id: row.get(1).unwrap_or_default(),
        reviewer_id: row.get(2).unwrap_or_default(),
        vote: VoteKind::from_str(&row.get::<_, String>(3).unwrap_or_default())
            .unwrap_or(VoteKind::Abstain),
        feedback: row.get(4).unwrap_or_default(),
        issues: serde_json::from_str(&issues_json).unwrap_or_default(),
        weight: row.get(6).unwrap_or(1.0),
        created_at: chrono::DateTime::from_timestamp_millis(row.get(7).unwrap_or(0))
            .unwrap_or_else(Utc::now),
    }
}
