//! RPC methods for the tool-call gate.
//!
//! Methods:
//! - `toolCall/create`          — track a new tool invocation
//! - `toolCall/start`           — mark a call running
//! - `toolCall/complete`        — record success and output
//! - `toolCall/fail`            — record failure
//! - `toolCall/awaitPermission` — park a call pending permission
//! - `toolCall/approve`         — record an approval
//! - `toolCall/deny`            — record a denial
//! - `toolCall/listByExecution` — list an execution's tool calls

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::tool_call::{ToolCall, ToolCallStatus};
use crate::rpc::error::RpcError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// toolCall/create
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParams {
    pub execution_id: String,
    pub node_execution_id: Option<String>,
    pub tool_name: String,
    #[serde(default)]
    pub input: serde_json::Value,
}

pub async fn create(state: &AppState, params: CreateParams) -> Result<ToolCall, RpcError> {
    Ok(state
        .gate
        .create(
            &params.execution_id,
            params.node_execution_id.as_deref(),
            &params.tool_name,
            params.input,
        )
        .await?)
}

// ---------------------------------------------------------------------------
// Transition methods share one id-only params shape.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdParams {
    pub id: String,
}

pub async fn start(state: &AppState, params: IdParams) -> Result<ToolCall, RpcError> {
    Ok(state.gate.start(&params.id).await?)
}

pub async fn await_permission(state: &AppState, params: IdParams) -> Result<ToolCall, RpcError> {
    Ok(state.gate.await_permission(&params.id).await?)
}

pub async fn approve(state: &AppState, params: IdParams) -> Result<ToolCall, RpcError> {
    Ok(state.gate.approve(&params.id).await?)
}

pub async fn deny(state: &AppState, params: IdParams) -> Result<ToolCall, RpcError> {
    Ok(state.gate.deny(&params.id).await?)
}

// ---------------------------------------------------------------------------
// toolCall/complete
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteParams {
    pub id: String,
    #[serde(default)]
    pub output: serde_json::Value,
}

pub async fn complete(state: &AppState, params: CompleteParams) -> Result<ToolCall, RpcError> {
    Ok(state.gate.complete(&params.id, params.output).await?)
}

// ---------------------------------------------------------------------------
// toolCall/fail
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailParams {
    pub id: String,
    pub error: String,
}

pub async fn fail(state: &AppState, params: FailParams) -> Result<ToolCall, RpcError> {
    Ok(state.gate.fail(&params.id, &params.error).await?)
}

// ---------------------------------------------------------------------------
// toolCall/listByExecution
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListByExecutionParams {
    pub execution_id: String,
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Fold the result into per-node groups.
    #[serde(default)]
    pub group_by_node: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListByExecutionResult {
    pub tool_calls: Vec<ToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<HashMap<String, Vec<ToolCall>>>,
    /// Complete map over every status value.
    pub counts: HashMap<String, u64>,
}

pub async fn list_by_execution(
    state: &AppState,
    params: ListByExecutionParams,
) -> Result<ListByExecutionResult, RpcError> {
    let tool_calls = match &params.status {
        Some(status_str) => {
            let status = ToolCallStatus::from_str(status_str).ok_or_else(|| {
                RpcError::InvalidParams(format!("Invalid status: {}", status_str))
            })?;
            state
                .gate
                .list_by_status(&params.execution_id, status)
                .await?
        }
        None => {
            state
                .gate
                .list_by_execution(&params.execution_id, params.limit, params.offset)
                .await?
        }
    };
    let groups = if params.group_by_node {
        Some(state.gate.list_grouped_by_node(&params.execution_id).await?)
    } else {
        None
    };
    let counts = state.gate.count_by_status(&params.execution_id).await?;
    Ok(ListByExecutionResult {
        tool_calls,
        groups,
        counts,
    })
}
