//! RPC methods for agent management and routing.
//!
//! Methods:
//! - `agent/register`      — register an agent with the shared registry
//! - `agent/unregister`    — remove an agent (primary is reassigned)
//! - `agent/list`          — list agents, optionally filtered by query
//! - `agent/delegate`      — route a task through the executor callback
//! - `agent/parseMentions` — resolve `@mentions` in free text

use serde::{Deserialize, Serialize};

use crate::models::agent::{
    Agent, AgentConfig, AgentMention, DelegationRequest, DelegationResult,
};
use crate::registry::DelegationContext;
use crate::rpc::error::RpcError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// agent/register
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterParams {
    #[serde(flatten)]
    pub config: AgentConfig,
}

pub async fn register(state: &AppState, params: RegisterParams) -> Result<Agent, RpcError> {
    Ok(state.registry.register(params.config).await)
}

// ---------------------------------------------------------------------------
// agent/unregister
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnregisterParams {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct UnregisterResult {
    pub removed: bool,
}

pub async fn unregister(
    state: &AppState,
    params: UnregisterParams,
) -> Result<UnregisterResult, RpcError> {
    state.registry.unregister(&params.id).await?;
    Ok(UnregisterResult { removed: true })
}

// ---------------------------------------------------------------------------
// agent/list
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// Case-insensitive substring filter over id, name, description, and
    /// trigger keywords.
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResult {
    pub agents: Vec<Agent>,
}

pub async fn list(state: &AppState, params: ListParams) -> Result<ListResult, RpcError> {
    let agents = match &params.query {
        Some(query) => state.registry.find(query).await,
        None => state.registry.list().await,
    };
    Ok(ListResult { agents })
}

// ---------------------------------------------------------------------------
// agent/delegate
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateParams {
    #[serde(flatten)]
    pub request: DelegationRequest,
    pub session_id: Option<String>,
}

pub async fn delegate(
    state: &AppState,
    params: DelegateParams,
) -> Result<DelegationResult, RpcError> {
    // Delegation failures are part of the result, never an RPC error.
    Ok(state
        .registry
        .delegate(
            params.request,
            DelegationContext {
                session_id: params.session_id,
                delegated_from: None,
                tools: None,
            },
        )
        .await)
}

// ---------------------------------------------------------------------------
// agent/parseMentions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseMentionsParams {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseMentionsResult {
    pub mentions: Vec<AgentMention>,
    pub clean_text: String,
}

pub async fn parse_mentions(
    state: &AppState,
    params: ParseMentionsParams,
) -> Result<ParseMentionsResult, RpcError> {
    let parse = state.registry.parse_mentions(&params.text).await;
    Ok(ParseMentionsResult {
        mentions: parse.mentions,
        clean_text: parse.clean_text,
    })
}
