use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four vote kinds a reviewer can cast.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VoteKind {
    Approve,
    RequestChanges,
    Critical,
    Abstain,
}

impl VoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::RequestChanges => "request_changes",
            Self::Critical => "critical",
            Self::Abstain => "abstain",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "approve" => Some(Self::Approve),
            "request_changes" => Some(Self::RequestChanges),
            "critical" => Some(Self::Critical),
            "abstain" => Some(Self::Abstain),
            _ => None,
        }
    }
}

/// The aggregated result of a review panel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    Approved,
    AddressCritical,
    QueueChanges,
    Escalate,
}

impl ReviewOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::AddressCritical => "address_critical",
            Self::QueueChanges => "queue_changes",
            Self::Escalate => "escalate",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(Self::Approved),
            "address_critical" => Some(Self::AddressCritical),
            "queue_changes" => Some(Self::QueueChanges),
            "escalate" => Some(Self::Escalate),
            _ => None,
        }
    }
}

/// How weighted votes are folded into an outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    AnyCritical,
    Unanimous,
    Majority,
    Quorum,
    #[default]
    WeightedThreshold,
}

impl VotingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnyCritical => "any_critical",
            Self::Unanimous => "unanimous",
            Self::Majority => "majority",
            Self::Quorum => "quorum",
            Self::WeightedThreshold => "weighted_threshold",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "any_critical" => Some(Self::AnyCritical),
            "unanimous" => Some(Self::Unanimous),
            "majority" => Some(Self::Majority),
            "quorum" => Some(Self::Quorum),
            "weighted_threshold" => Some(Self::WeightedThreshold),
            _ => None,
        }
    }
}

/// Threshold knobs for vote aggregation. Percentage thresholds are left
/// optional because their defaults differ per strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    /// Minimum non-abstaining votes required before an outcome is trusted.
    #[serde(default = "default_quorum")]
    pub quorum: usize,
    /// When true (default), any critical weight forces `address_critical`.
    #[serde(default = "default_critical_blocks")]
    pub critical_blocks: bool,
    #[serde(default)]
    pub approve_threshold: Option<f64>,
    #[serde(default)]
    pub changes_threshold: Option<f64>,
}

fn default_quorum() -> usize {
    1
}

fn default_critical_blocks() -> bool {
    true
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            quorum: 1,
            critical_blocks: true,
            approve_threshold: None,
            changes_threshold: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VotingConfig {
    #[serde(default)]
    pub strategy: VotingStrategy,
    #[serde(default)]
    pub thresholds: Thresholds,
}

/// Panel configuration: which reviewers vote and how votes are folded.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewConfig {
    pub reviewers: Vec<String>,
    #[serde(default)]
    pub voting: VotingConfig,
}

/// An issue raised by a reviewer alongside a vote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewIssue {
    pub severity: String,
    pub description: String,
}

impl ReviewIssue {
    pub fn is_critical(&self) -> bool {
        self.severity.eq_ignore_ascii_case("critical")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PanelStatus {
    Pending,
    Collecting,
    Completed,
}

impl PanelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Collecting => "collecting",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "collecting" => Some(Self::Collecting),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// One run of a review panel against a node execution's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPanelExecution {
    pub id: String,
    pub node_execution_id: String,
    pub execution_id: String,
    pub config: ReviewConfig,
    pub status: PanelStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ReviewOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ReviewSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewPanelExecution {
    pub fn new(node_execution_id: String, execution_id: String, config: ReviewConfig) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            node_execution_id,
            execution_id,
            config,
            status: PanelStatus::Pending,
            outcome: None,
            summary: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A single weighted vote. Append-only; a reviewer may vote more than
/// once and every vote is counted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerVote {
    pub id: String,
    pub panel_execution_id: String,
    pub reviewer_id: String,
    pub vote: VoteKind,
    pub feedback: String,
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

impl ReviewerVote {
    pub fn new(
        panel_execution_id: String,
        reviewer_id: String,
        vote: VoteKind,
        feedback: String,
        issues: Vec<ReviewIssue>,
        weight: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            panel_execution_id,
            reviewer_id,
            vote,
            feedback,
            issues,
            weight,
            created_at: Utc::now(),
        }
    }
}

/// Persisted aggregation summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub total_weight: f64,
    pub critical_weight: f64,
    pub changes_weight: f64,
    pub approve_weight: f64,
    pub abstain_count: usize,
    pub approval_percentage: f64,
    pub changes_percentage: f64,
    pub quorum_met: bool,
    pub outcome_reason: String,
    pub critical_issues: Vec<ReviewIssue>,
    pub other_issues: Vec<ReviewIssue>,
}
