//! Schema types for workflow definitions.
//!
//! A workflow YAML defines a dependency-ordered multi-agent pipeline:
//!
//! ```yaml
//! name: "Release Review"
//! trigger:
//!   type: manual
//!
//! onError: retry
//! maxIterations: 8
//! defaultAllowedTools: [read_file, search]
//! defaultAgentId: lead
//!
//! steps:
//!   - id: draft
//!     prompt: "Draft the release notes for @writer"
//!
//!   - id: review
//!     type: review
//!     depends: [draft]
//!     review:
//!       reviewers: [alice, bob, carol]
//!       voting:
//!         strategy: weighted_threshold
//!         thresholds:
//!           quorum: 2
//!
//!   - id: publish
//!     depends: [review]
//!     checkpoint: true
//!     agent: lead
//!     allowedTools: [publish_release]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::review::ReviewConfig;

/// Top-level workflow definition, loaded from YAML/JSON or built inline.
/// Immutable once stored; updated only via whole replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    #[serde(default = "new_id")]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// How the workflow is triggered
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// What to do when a step fails
    #[serde(default)]
    pub on_error: OnError,

    /// Ceiling on full scheduling passes over the graph
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Tool allow-list applied to steps without their own override
    #[serde(default)]
    pub default_allowed_tools: Vec<String>,

    /// Tool deny-list applied to steps without their own override
    #[serde(default)]
    pub default_denied_tools: Vec<String>,

    /// Agent ids this workflow draws on
    #[serde(default)]
    pub agent_pool: Vec<String>,

    /// Fallback agent for steps with no explicit agent or mention
    #[serde(default)]
    pub default_agent_id: Option<String>,

    /// Dependency-ordered steps
    pub steps: Vec<Step>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_max_iterations() -> u32 {
    10
}

/// Trigger configuration — how/when the workflow runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Trigger type: "manual", "webhook", "schedule"
    #[serde(rename = "type", default = "default_trigger_type")]
    pub trigger_type: String,

    /// Trigger-specific settings (event source, cron expression, ...)
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

fn default_trigger_type() -> String {
    "manual".to_string()
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            trigger_type: default_trigger_type(),
            config: HashMap::new(),
        }
    }
}

/// What to do when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Abort the whole execution (default)
    #[default]
    Fail,
    /// Re-queue the failed step, subject to the iteration cap
    Retry,
    /// Mark the step failed and proceed with independent branches
    Continue,
}

impl OnError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Retry => "retry",
            Self::Continue => "continue",
        }
    }
}

/// A single step in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Step id (unique within the workflow, referenced by `depends`)
    pub id: String,

    /// Step type: "agent" (default) or "review"
    #[serde(rename = "type", default = "default_step_type")]
    pub step_type: String,

    /// Explicit target agent; falls back to prompt mentions, then the
    /// workflow default, then the primary agent
    #[serde(default)]
    pub agent: Option<String>,

    /// Named action for the agent to perform
    #[serde(default)]
    pub action: Option<String>,

    /// Prompt template — supports `${steps.<id>.output}` references
    #[serde(default)]
    pub prompt: Option<String>,

    /// Step ids that must complete before this step runs
    #[serde(default)]
    pub depends: Vec<String>,

    /// Pause for a recorded decision before running this step
    #[serde(default)]
    pub checkpoint: bool,

    /// Tool allow-list override for this step
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,

    /// Tool deny-list override for this step
    #[serde(default)]
    pub denied_tools: Option<Vec<String>>,

    /// Panel configuration, required when `type: review`
    #[serde(default)]
    pub review: Option<ReviewConfig>,
}

fn default_step_type() -> String {
    "agent".to_string()
}

impl Step {
    /// Effective tool allow-list: step override, else workflow default.
    pub fn effective_allowed_tools<'a>(&'a self, def: &'a WorkflowDefinition) -> &'a [String] {
        match &self.allowed_tools {
            Some(tools) => tools,
            None => &def.default_allowed_tools,
        }
    }

    /// Effective tool deny-list: step override, else workflow default.
    pub fn effective_denied_tools<'a>(&'a self, def: &'a WorkflowDefinition) -> &'a [String] {
        match &self.denied_tools {
            Some(tools) => tools,
            None => &def.default_denied_tools,
        }
    }

    pub fn is_review(&self) -> bool {
        self.step_type == "review"
    }
}

impl WorkflowDefinition {
    /// Parse a workflow definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| format!("Failed to parse workflow YAML: {}", e))
    }

    /// Load a workflow definition from a file path.
    pub fn from_file(path: &str) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read workflow file '{}': {}", path, e))?;
        Self::from_yaml(&content)
    }

    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == step_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_workflow() {
        let yaml = r#"
name: "Test Flow"
steps:
  - id: "draft"
    prompt: "Hello, world!"
"#;
        let wf = WorkflowDefinition::from_yaml(yaml).unwrap();
        assert_eq!(wf.name, "Test Flow");
        assert_eq!(wf.steps.len(), 1);
        assert_eq!(wf.steps[0].id, "draft");
        assert_eq!(wf.steps[0].step_type, "agent");
        assert_eq!(wf.trigger.trigger_type, "manual");
        assert_eq!(wf.on_error, OnError::Fail);
        assert_eq!(wf.max_iterations, 10);
        assert!(!wf.steps[0].checkpoint);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.yaml");
        std::fs::write(&path, "name: FileFlow\nsteps:\n  - id: one\n").unwrap();

        let wf = WorkflowDefinition::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(wf.name, "FileFlow");
        assert_eq!(wf.steps[0].id, "one");

        assert!(WorkflowDefinition::from_file("/nonexistent/flow.yaml").is_err());
    }

    #[test]
    fn test_parse_full_workflow() {
        let yaml = r#"
name: "Release Review"
description: "Draft, review, publish"
trigger:
  type: webhook
  config:
    source: github
onError: retry
maxIterations: 8
defaultAllowedTools: [read_file, search]
defaultAgentId: lead
agentPool: [lead, writer]
steps:
  - id: draft
    agent: writer
    prompt: "Draft the notes"
  - id: review
    type: review
    depends: [draft]
    review:
      reviewers: [alice, bob]
      voting:
        strategy: majority
        thresholds:
          quorum: 2
  - id: publish
    depends: [review]
    checkpoint: true
    allowedTools: [publish_release]
"#;
        let wf = WorkflowDefinition::from_yaml(yaml).unwrap();
        assert_eq!(wf.on_error, OnError::Retry);
        assert_eq!(wf.max_iterations, 8);
        assert_eq!(wf.trigger.trigger_type, "webhook");
        assert_eq!(wf.default_agent_id.as_deref(), Some("lead"));
        assert_eq!(wf.steps.len(), 3);

        let review = wf.step("review").unwrap();
        assert!(review.is_review());
        let config = review.review.as_ref().unwrap();
        assert_eq!(config.reviewers, vec!["alice", "bob"]);
        assert_eq!(config.voting.thresholds.quorum, 2);

        let publish = wf.step("publish").unwrap();
        assert!(publish.checkpoint);
        assert_eq!(
            publish.effective_allowed_tools(&wf),
            &["publish_release".to_string()]
        );
        assert_eq!(
            wf.step("draft").unwrap().effective_allowed_tools(&wf),
            &["read_file".to_string(), "search".to_string()]
        );
    }
}
