use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a tracked tool invocation.
///
/// Two interleaved machines share this enum: permission
/// (`pending → awaiting_permission → approved | denied`) and execution
/// (`pending/approved → running → success | error`). Status only moves
/// forward; the gate rejects any other transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    AwaitingPermission,
    Approved,
    Denied,
    Running,
    Success,
    Error,
}

impl ToolCallStatus {
    /// Every status value, in machine order. Used to build complete
    /// per-status maps with zero defaults.
    pub const ALL: [ToolCallStatus; 7] = [
        Self::Pending,
        Self::AwaitingPermission,
        Self::Approved,
        Self::Denied,
        Self::Running,
        Self::Success,
        Self::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AwaitingPermission => "awaiting_permission",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "awaiting_permission" => Some(Self::AwaitingPermission),
            "approved" => Some(Self::Approved),
            "denied" => Some(Self::Denied),
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Forward-only transition table.
    pub fn can_transition(from: ToolCallStatus, to: ToolCallStatus) -> bool {
        use ToolCallStatus::*;
        matches!(
            (from, to),
            (Pending, AwaitingPermission)
                | (AwaitingPermission, Approved)
                | (AwaitingPermission, Denied)
                | (Pending, Running)
                | (Approved, Running)
                | (Running, Success)
                | (Running, Error)
                | (Pending, Error)
                | (Approved, Error)
        )
    }
}

/// One tracked tool invocation, owned by a node execution. Immutable
/// history once it reaches `success`, `error`, or `denied`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub id: String,
    pub execution_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_execution_id: Option<String>,
    pub tool_name: String,
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    pub status: ToolCallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ToolCall {
    pub fn new(
        execution_id: String,
        node_execution_id: Option<String>,
        tool_name: String,
        input: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            execution_id,
            node_execution_id,
            tool_name,
            input,
            output: None,
            status: ToolCallStatus::Pending,
            error_message: None,
            started_at: Some(Utc::now()),
            completed_at: None,
        }
    }
}
