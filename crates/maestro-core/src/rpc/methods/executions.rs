//! RPC methods for driving executions.
//!
//! Methods:
//! - `execution/start` — create an execution for a stored workflow
//! - `execution/run`   — drive an execution until it completes or halts
//! - `execution/get`   — fetch an execution and its node executions

use serde::{Deserialize, Serialize};

use crate::models::execution::{Execution, NodeExecution};
use crate::rpc::error::RpcError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// execution/start
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartParams {
    pub workflow_id: String,
}

pub async fn start(state: &AppState, params: StartParams) -> Result<Execution, RpcError> {
    Ok(state.engine.start(&params.workflow_id).await?)
}

// ---------------------------------------------------------------------------
// execution/run
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunParams {
    pub id: String,
}

pub async fn run(state: &AppState, params: RunParams) -> Result<Execution, RpcError> {
    Ok(state.engine.run(&params.id).await?)
}

// ---------------------------------------------------------------------------
// execution/get
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetParams {
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResult {
    pub execution: Execution,
    pub nodes: Vec<NodeExecution>,
}

pub async fn get(state: &AppState, params: GetParams) -> Result<GetResult, RpcError> {
    let execution = state
        .execution_store
        .get(&params.id)
        .await?
        .ok_or_else(|| RpcError::NotFound(format!("Execution {} not found", params.id)))?;
    let nodes = state.execution_store.list_nodes(&params.id).await?;
    Ok(GetResult { execution, nodes })
}
