//! RPC methods for review panels.
//!
//! Methods:
//! - `reviewPanel/create`    — open a panel for a node execution
//! - `reviewPanel/addVote`   — append a reviewer vote
//! - `reviewPanel/aggregate` — fold votes into an outcome
//! - `reviewPanel/stats`     — vote counts and panel status

use serde::{Deserialize, Serialize};

use crate::consensus::PanelStats;
use crate::models::review::{
    ReviewConfig, ReviewIssue, ReviewOutcome, ReviewPanelExecution, ReviewSummary, ReviewerVote,
    VoteKind,
};
use crate::rpc::error::RpcError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// reviewPanel/create
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParams {
    pub node_execution_id: String,
    pub execution_id: String,
    pub config: ReviewConfig,
    /// Move straight to vote collection after creation.
    #[serde(default)]
    pub start_collecting: bool,
}

pub async fn create(
    state: &AppState,
    params: CreateParams,
) -> Result<ReviewPanelExecution, RpcError> {
    let panel = state
        .reviews
        .create_panel(&params.node_execution_id, &params.execution_id, params.config)
        .await?;
    if params.start_collecting {
        state.reviews.start_collecting(&panel.id).await?;
        return Ok(state.reviews.get_panel(&panel.id).await?);
    }
    Ok(panel)
}

// ---------------------------------------------------------------------------
// reviewPanel/addVote
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddVoteParams {
    pub panel_id: String,
    pub reviewer_id: String,
    pub vote: String,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

pub async fn add_vote(state: &AppState, params: AddVoteParams) -> Result<ReviewerVote, RpcError> {
    let vote = VoteKind::from_str(&params.vote)
        .ok_or_else(|| RpcError::InvalidParams(format!("Invalid vote kind: {}", params.vote)))?;
    Ok(state
        .reviews
        .add_vote(
            &params.panel_id,
            &params.reviewer_id,
            vote,
            params.feedback,
            params.issues,
            params.weight,
        )
        .await?)
}

// ---------------------------------------------------------------------------
// reviewPanel/aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateParams {
    pub panel_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub outcome: ReviewOutcome,
    pub summary: ReviewSummary,
}

pub async fn aggregate(
    state: &AppState,
    params: AggregateParams,
) -> Result<AggregateResult, RpcError> {
    let (outcome, summary) = state.reviews.aggregate(&params.panel_id).await?;
    Ok(AggregateResult { outcome, summary })
}

// ---------------------------------------------------------------------------
// reviewPanel/stats
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsParams {
    pub panel_id: String,
}

pub async fn stats(state: &AppState, params: StatsParams) -> Result<PanelStats, RpcError> {
    Ok(state.reviews.stats(&params.panel_id).await?)
}
