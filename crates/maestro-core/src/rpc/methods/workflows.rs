//! RPC methods for workflow definitions.
//!
//! Methods:
//! - `workflow/create`     — validate and store a definition
//! - `workflow/get`        — get a stored workflow by id
//! - `workflow/list`       — list stored workflows
//! - `workflow/update`     — replace a stored definition
//! - `workflow/delete`     — delete a workflow
//! - `workflow/setDefault` — flag one workflow as the default

use serde::{Deserialize, Serialize};

use crate::rpc::error::RpcError;
use crate::state::AppState;
use crate::store::workflow_store::StoredWorkflow;
use crate::workflow::schema::WorkflowDefinition;
use crate::workflow::validate::validate_definition;

// ---------------------------------------------------------------------------
// workflow/create
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParams {
    pub definition: WorkflowDefinition,
    #[serde(default)]
    pub set_default: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResult {
    pub workflow_id: String,
    pub workflow: StoredWorkflow,
}

pub async fn create(state: &AppState, params: CreateParams) -> Result<CreateResult, RpcError> {
    validate_definition(&params.definition)?;
    state.workflow_store.save(&params.definition).await?;
    if params.set_default {
        state.workflow_store.set_default(&params.definition.id).await?;
    }
    let workflow = state
        .workflow_store
        .get(&params.definition.id)
        .await?
        .ok_or_else(|| RpcError::Internal("Workflow vanished after save".to_string()))?;
    Ok(CreateResult {
        workflow_id: workflow.definition.id.clone(),
        workflow,
    })
}

// ---------------------------------------------------------------------------
// workflow/get
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetParams {
    pub id: String,
}

pub async fn get(state: &AppState, params: GetParams) -> Result<StoredWorkflow, RpcError> {
    state
        .workflow_store
        .get(&params.id)
        .await?
        .ok_or_else(|| RpcError::NotFound(format!("Workflow {} not found", params.id)))
}

// ---------------------------------------------------------------------------
// workflow/list
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ListResult {
    pub workflows: Vec<StoredWorkflow>,
}

pub async fn list(state: &AppState) -> Result<ListResult, RpcError> {
    Ok(ListResult {
        workflows: state.workflow_store.list().await?,
    })
}

// ---------------------------------------------------------------------------
// workflow/update
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParams {
    pub definition: WorkflowDefinition,
}

#[derive(Debug, Serialize)]
pub struct UpdateResult {
    pub updated: bool,
}

pub async fn update(state: &AppState, params: UpdateParams) -> Result<UpdateResult, RpcError> {
    validate_definition(&params.definition)?;
    state
        .workflow_store
        .get(&params.definition.id)
        .await?
        .ok_or_else(|| {
            RpcError::NotFound(format!("Workflow {} not found", params.definition.id))
        })?;
    state.workflow_store.save(&params.definition).await?;
    Ok(UpdateResult { updated: true })
}

// ---------------------------------------------------------------------------
// workflow/delete
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParams {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub deleted: bool,
}

pub async fn delete(state: &AppState, params: DeleteParams) -> Result<DeleteResult, RpcError> {
    let deleted = state.workflow_store.delete(&params.id).await?;
    Ok(DeleteResult { deleted })
}

// ---------------------------------------------------------------------------
// workflow/setDefault
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDefaultParams {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct SetDefaultResult {
    pub updated: bool,
}

pub async fn set_default(
    state: &AppState,
    params: SetDefaultParams,
) -> Result<SetDefaultResult, RpcError> {
    state.workflow_store.set_default(&params.id).await?;
    Ok(SetDefaultResult { updated: true })
}
