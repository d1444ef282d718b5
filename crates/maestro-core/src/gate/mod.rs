//! Tool-call gate — tracks every tool invocation a node performs, from
//! creation through permission-gating to completion.
//!
//! The gate records the *effect* of permission decisions; it is not a
//! policy engine. Transitions are validated against the forward-only
//! table on [`ToolCallStatus`] and applied atomically per call id.

use std::collections::HashMap;

use crate::error::CoreError;
use crate::models::tool_call::{ToolCall, ToolCallStatus};
use crate::store::tool_call_store::{ToolCallStore, TransitionPatch};

#[derive(Clone)]
pub struct ToolCallGate {
    store: ToolCallStore,
}

impl ToolCallGate {
    pub fn new(store: ToolCallStore) -> Self {
        Self { store }
    }

    /// Track a new tool invocation. Status `pending`, `started_at` now.
    pub async fn create(
        &self,
        execution_id: &str,
        node_execution_id: Option<&str>,
        tool_name: &str,
        input: serde_json::Value,
    ) -> Result<ToolCall, CoreError> {
        let call = ToolCall::new(
            execution_id.to_string(),
            node_execution_id.map(|s| s.to_string()),
            tool_name.to_string(),
            input,
        );
        self.store.save(&call).await?;
        Ok(call)
    }

    pub async fn get(&self, tool_call_id: &str) -> Result<ToolCall, CoreError> {
        self.store
            .get(tool_call_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Tool call {} not found", tool_call_id)))
    }

    pub async fn await_permission(&self, tool_call_id: &str) -> Result<ToolCall, CoreError> {
        self.store
            .transition(
                tool_call_id,
                ToolCallStatus::AwaitingPermission,
                TransitionPatch::default(),
            )
            .await
    }

    pub async fn approve(&self, tool_call_id: &str) -> Result<ToolCall, CoreError> {
        self.store
            .transition(
                tool_call_id,
                ToolCallStatus::Approved,
                TransitionPatch::default(),
            )
            .await
    }

    pub async fn deny(&self, tool_call_id: &str) -> Result<ToolCall, CoreError> {
        self.store
            .transition(
                tool_call_id,
                ToolCallStatus::Denied,
                TransitionPatch::default(),
            )
            .await
    }

    /// Move to `running`. The original `started_at` is preserved.
    pub async fn start(&self, tool_call_id: &str) -> Result<ToolCall, CoreError> {
        self.store
            .transition(
                tool_call_id,
                ToolCallStatus::Running,
                TransitionPatch::default(),
            )
            .await
    }

    pub async fn complete(
        &self,
        tool_call_id: &str,
        output: serde_json::Value,
    ) -> Result<ToolCall, CoreError> {
        self.store
            .transition(
                tool_call_id,
                ToolCallStatus::Success,
                TransitionPatch {
                    output: Some(output),
                    error_message: None,
                    set_completed_at: true,
                },
            )
            .await
    }

    pub async fn fail(&self, tool_call_id: &str, error: &str) -> Result<ToolCall, CoreError> {
        self.store
            .transition(
                tool_call_id,
                ToolCallStatus::Error,
                TransitionPatch {
                    output: None,
                    error_message: Some(error.to_string()),
                    set_completed_at: true,
                },
            )
            .await
    }

    pub async fn list_by_execution(
        &self,
        execution_id: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<ToolCall>, CoreError> {
        self.store.list_by_execution(execution_id, limit, offset).await
    }

    pub async fn list_by_node(
        &self,
        node_execution_id: &str,
    ) -> Result<Vec<ToolCall>, CoreError> {
        self.store.list_by_node(node_execution_id).await
    }

    pub async fn list_by_status(
        &self,
        execution_id: &str,
        status: ToolCallStatus,
    ) -> Result<Vec<ToolCall>, CoreError> {
        self.store.list_by_status(execution_id, status).await
    }

    /// Fold an execution's tool calls into per-node groups. Calls with no
    /// node execution land under `"ungrouped"`.
    pub async fn list_grouped_by_node(
        &self,
        execution_id: &str,
    ) -> Result<HashMap<String, Vec<ToolCall>>, CoreError> {
        let calls = self.store.list_by_execution(execution_id, None, None).await?;
        let mut groups: HashMap<String, Vec<ToolCall>> = HashMap::new();
        for call in calls {
            let key = call
                .node_execution_id
                .clone()
                .unwrap_or_else(|| "ungrouped".to_string());
            groups.entry(key).or_default().push(call);
        }
        Ok(groups)
    }

    /// Counts per status, complete over every status value (absent → 0).
    pub async fn count_by_status(
        &self,
        execution_id: &str,
    ) -> Result<HashMap<String, u64>, CoreError> {
        let raw = self.store.count_by_status(execution_id).await?;
        let mut counts = HashMap::new();
        for status in ToolCallStatus::ALL {
            counts.insert(
                status.as_str().to_string(),
                raw.get(status.as_str()).copied().unwrap_or(0),
            );
        }
        Ok(counts)
    }

    pub async fn pending_permission_requests(
        &self,
        execution_id: &str,
    ) -> Result<Vec<ToolCall>, CoreError> {
        self.list_by_status(execution_id, ToolCallStatus::AwaitingPermission)
            .await
    }
}

/// Per-node tool access handed to the agent executor callback. Applies
/// the step's effective allow/deny lists and records the decision's
/// effect through the gate.
#[derive(Clone)]
pub struct ToolBroker {
    gate: ToolCallGate,
    execution_id: String,
    node_execution_id: String,
    allowed: Vec<String>,
    denied: Vec<String>,
}

impl ToolBroker {
    pub fn new(
        gate: ToolCallGate,
        execution_id: String,
        node_execution_id: String,
        allowed: Vec<String>,
        denied: Vec<String>,
    ) -> Self {
        Self {
            gate,
            execution_id,
            node_execution_id,
            allowed,
            denied,
        }
    }

    /// A tool is allowed only when it appears in the allow-list and not
    /// in the deny-list.
    pub fn is_allowed(&self, tool_name: &str) -> bool {
        if self.denied.iter().any(|t| t == tool_name) {
            return false;
        }
        self.allowed.iter().any(|t| t == tool_name)
    }

    /// Track a tool request: approved when the name passes the lists,
    /// otherwise walked through `awaiting_permission` and denied.
    pub async fn request(
        &self,
        tool_name: &str,
        input: serde_json::Value,
    ) -> Result<ToolCall, CoreError> {
        let call = self
            .gate
            .create(
                &self.execution_id,
                Some(&self.node_execution_id),
                tool_name,
                input,
            )
            .await?;
        if self.is_allowed(tool_name) {
            let call = self.gate.await_permission(&call.id).await?;
            self.gate.approve(&call.id).await
        } else {
            tracing::warn!(
                "Tool '{}' denied for node {} (not in effective allow-list)",
                tool_name,
                self.node_execution_id
            );
            let call = self.gate.await_permission(&call.id).await?;
            self.gate.deny(&call.id).await
        }
    }
}
