use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of an agent within a registry. Exactly one agent is designated
/// primary at a time; the registry enforces this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Primary,
    Specialist,
    Reviewer,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Specialist => "specialist",
            Self::Reviewer => "reviewer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "primary" => Some(Self::Primary),
            "specialist" => Some(Self::Specialist),
            "reviewer" => Some(Self::Reviewer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Thinking,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "thinking" => Some(Self::Thinking),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Cumulative token usage recorded against an agent across delegations.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// A registered agent. Registry-resident; the registry owns the mutable
/// status and usage bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub role: AgentRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub trigger_keywords: Vec<String>,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active_at: Option<DateTime<Utc>>,
    pub message_count: u64,
    pub total_usage: TokenUsage,
}

/// Configuration used to register an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default = "default_role")]
    pub role: AgentRole,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub trigger_keywords: Vec<String>,
}

fn default_role() -> AgentRole {
    AgentRole::Specialist
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            id: config
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: config.name,
            role: config.role,
            description: config.description,
            trigger_keywords: config.trigger_keywords,
            status: AgentStatus::Idle,
            last_active_at: None,
            message_count: 0,
            total_usage: TokenUsage::default(),
        }
    }
}

/// One `@mention` located in free text, resolved to a registered agent.
/// Indices are byte offsets into the original text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentMention {
    pub agent_id: String,
    pub start_index: usize,
    pub end_index: usize,
    pub matched_text: String,
}

/// Response from an agent executor call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    /// The agent's text response
    pub content: String,
    /// Usage statistics, when the executor reports them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Result of delegating a task to an agent. Delegation never raises for
/// expected failures; it reports them here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationResult {
    pub success: bool,
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// A request to route a task to a specific agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationRequest {
    #[serde(default)]
    pub from_agent_id: Option<String>,
    pub to_agent_id: String,
    pub task: String,
    #[serde(default)]
    pub context: Option<String>,
}
