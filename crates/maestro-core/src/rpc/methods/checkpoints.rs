//! RPC methods for checkpoints.
//!
//! Methods:
//! - `checkpoint/create`         — open a decision point on an execution
//! - `checkpoint/get`            — get a checkpoint by id
//! - `checkpoint/list`           — list an execution's checkpoints
//! - `checkpoint/recordDecision` — record the human/arbiter decision

use serde::{Deserialize, Serialize};

use crate::models::checkpoint::Checkpoint;
use crate::rpc::error::RpcError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// checkpoint/create
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParams {
    pub execution_id: String,
    pub node_execution_id: Option<String>,
    #[serde(default = "default_checkpoint_type")]
    pub checkpoint_type: String,
    pub prompt_message: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

fn default_checkpoint_type() -> String {
    "approval".to_string()
}

pub async fn create(state: &AppState, params: CreateParams) -> Result<Checkpoint, RpcError> {
    Ok(state
        .checkpoints
        .create(
            &params.execution_id,
            params.node_execution_id.as_deref(),
            &params.checkpoint_type,
            params.prompt_message,
            params.options,
        )
        .await?)
}

// ---------------------------------------------------------------------------
// checkpoint/get
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetParams {
    pub id: String,
}

pub async fn get(state: &AppState, params: GetParams) -> Result<Checkpoint, RpcError> {
    state
        .checkpoints
        .get(&params.id)
        .await?
        .ok_or_else(|| RpcError::NotFound(format!("Checkpoint {} not found", params.id)))
}

// ---------------------------------------------------------------------------
// checkpoint/list
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub execution_id: String,
    /// When true, only the most recent undecided checkpoint is returned.
    #[serde(default)]
    pub pending_only: bool,
}

#[derive(Debug, Serialize)]
pub struct ListResult {
    pub checkpoints: Vec<Checkpoint>,
}

pub async fn list(state: &AppState, params: ListParams) -> Result<ListResult, RpcError> {
    let checkpoints = if params.pending_only {
        state
            .checkpoints
            .pending(&params.execution_id)
            .await?
            .into_iter()
            .collect()
    } else {
        state.checkpoints.list(&params.execution_id).await?
    };
    Ok(ListResult { checkpoints })
}

// ---------------------------------------------------------------------------
// checkpoint/recordDecision
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDecisionParams {
    pub id: String,
    pub decision: String,
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordDecisionResult {
    pub recorded: bool,
}

pub async fn record_decision(
    state: &AppState,
    params: RecordDecisionParams,
) -> Result<RecordDecisionResult, RpcError> {
    let recorded = state
        .checkpoints
        .record_decision(&params.id, &params.decision, params.feedback)
        .await?;
    Ok(RecordDecisionResult { recorded })
}
