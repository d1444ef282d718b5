//! Workflow execution engine — walks the dependency graph of a running
//! execution and composes the registry, checkpoint controller, tool-call
//! gate, and review coordinator.
//!
//! Scheduling is deterministic and sequential: each pass sweeps the steps
//! in definition order and runs every step whose dependencies are
//! complete. Independent branches are not dispatched concurrently.
//! Checkpoint and review-panel halts are expected terminal states of a
//! single pass, surfaced as `awaiting_checkpoint` — never as errors.

use std::collections::HashMap;

use chrono::Utc;
use regex::Regex;

use crate::checkpoint::CheckpointController;
use crate::consensus::{parse_reviewer_response, ReviewCoordinator};
use crate::error::CoreError;
use crate::events::{EngineEvent, EngineEventType, EventBus};
use crate::gate::{ToolBroker, ToolCallGate};
use crate::models::execution::{Execution, ExecutionStatus, NodeExecution, NodeStatus};
use crate::models::review::{ReviewOutcome, VoteKind};
use crate::registry::{AgentRegistry, DelegationContext};
use crate::models::agent::DelegationRequest;
use crate::store::{ExecutionStore, WorkflowStore};
use crate::workflow::schema::{OnError, Step, WorkflowDefinition};
use crate::workflow::validate::validate_definition;

/// Outcome of handling one step within a pass.
enum StepOutcome {
    Ran,
    Halted,
    Blocked,
    AbortedExecution,
}

/// The workflow execution engine.
#[derive(Clone)]
pub struct ExecutionEngine {
    workflow_store: WorkflowStore,
    execution_store: ExecutionStore,
    checkpoints: CheckpointController,
    gate: ToolCallGate,
    reviews: ReviewCoordinator,
    registry: AgentRegistry,
    event_bus: EventBus,
}

impl ExecutionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workflow_store: WorkflowStore,
        execution_store: ExecutionStore,
        checkpoints: CheckpointController,
        gate: ToolCallGate,
        reviews: ReviewCoordinator,
        registry: AgentRegistry,
        event_bus: EventBus,
    ) -> Self {
        Self {
            workflow_store,
            execution_store,
            checkpoints,
            gate,
            reviews,
            registry,
            event_bus,
        }
    }

    /// Create a new execution for a stored workflow. The definition is
    /// re-validated so a stored-but-stale workflow cannot start.
    pub async fn start(&self, workflow_id: &str) -> Result<Execution, CoreError> {
        let workflow = self
            .workflow_store
            .get(workflow_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Workflow {} not found", workflow_id)))?;
        validate_definition(&workflow.definition)?;

        let mut execution = Execution::new(workflow.definition.id.clone());
        execution.status = ExecutionStatus::Running;
        execution.started_at = Some(Utc::now());
        self.execution_store.save(&execution).await?;

        tracing::info!(
            "Execution {} started for workflow '{}'",
            execution.id,
            workflow.definition.name
        );
        self.event_bus
            .emit(EngineEvent::new(
                EngineEventType::ExecutionStarted,
                Some(execution.id.clone()),
                serde_json::json!({ "workflowId": workflow.definition.id }),
            ))
            .await;
        Ok(execution)
    }

    pub async fn get(&self, execution_id: &str) -> Result<Execution, CoreError> {
        self.execution_store
            .get(execution_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Execution {} not found", execution_id)))
    }

    /// Drive an execution until it completes, fails, or halts on a
    /// checkpoint. Safe to call again after a checkpoint decision lands.
    pub async fn run(&self, execution_id: &str) -> Result<Execution, CoreError> {
        let mut execution = self.get(execution_id).await?;
        if execution.status.is_terminal() {
            return Ok(execution);
        }
        let workflow = self
            .workflow_store
            .get(&execution.workflow_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!("Workflow {} not found", execution.workflow_id))
            })?;
        let def = workflow.definition;

        execution.status = ExecutionStatus::Running;

        loop {
            execution.iteration += 1;
            if execution.iteration > def.max_iterations {
                return self
                    .fail_execution(
                        execution,
                        format!("iteration cap of {} exceeded", def.max_iterations),
                    )
                    .await;
            }
            execution.updated_at = Utc::now();
            self.execution_store.save(&execution).await?;

            let mut latest = self.latest_nodes(&execution.id).await?;
            let mut progressed = false;

            for step in &def.steps {
                match self
                    .process_step(&mut execution, &def, step, &mut latest)
                    .await?
                {
                    StepOutcome::Ran => progressed = true,
                    StepOutcome::Blocked => {}
                    StepOutcome::Halted => {
                        execution.status = ExecutionStatus::AwaitingCheckpoint;
                        execution.updated_at = Utc::now();
                        self.execution_store.save(&execution).await?;
                        return Ok(execution);
                    }
                    StepOutcome::AbortedExecution => {
                        return Ok(self.get(&execution.id).await?);
                    }
                }
            }

            if !progressed {
                execution.status = ExecutionStatus::Completed;
                execution.completed_at = Some(Utc::now());
                execution.updated_at = Utc::now();
                self.execution_store.save(&execution).await?;
                tracing::info!("Execution {} completed", execution.id);
                self.event_bus
                    .emit(EngineEvent::new(
                        EngineEventType::ExecutionCompleted,
                        Some(execution.id.clone()),
                        serde_json::json!({ "iterations": execution.iteration }),
                    ))
                    .await;
                return Ok(execution);
            }
        }
    }

    /// Decide what to do with one step in the current pass.
    async fn process_step(
        &self,
        execution: &mut Execution,
        def: &WorkflowDefinition,
        step: &Step,
        latest: &mut HashMap<String, NodeExecution>,
    ) -> Result<StepOutcome, CoreError> {
        // Steps already settled this execution.
        if let Some(node) = latest.get(&step.id) {
            match node.status {
                NodeStatus::Success | NodeStatus::Skipped => return Ok(StepOutcome::Blocked),
                NodeStatus::Failed if def.on_error != OnError::Retry => {
                    return Ok(StepOutcome::Blocked)
                }
                _ => {}
            }
        }

        // Dependency gate.
        let mut deps_met = true;
        for dep in &step.depends {
            match latest.get(dep).map(|n| n.status) {
                Some(NodeStatus::Success) => {}
                Some(NodeStatus::Failed) if def.on_error == OnError::Continue => {
                    // The dependency can never recover; this branch is dead.
                    let node = self.skip_node(execution, step, latest).await?;
                    latest.insert(step.id.clone(), node);
                    return Ok(StepOutcome::Ran);
                }
                Some(NodeStatus::Skipped) => {
                    let node = self.skip_node(execution, step, latest).await?;
                    latest.insert(step.id.clone(), node);
                    return Ok(StepOutcome::Ran);
                }
                _ => deps_met = false,
            }
        }
        if !deps_met {
            return Ok(StepOutcome::Blocked);
        }

        // Resume a node left pending by a checkpoint halt, or open a new
        // attempt.
        let node = match latest.get(&step.id) {
            Some(n) if matches!(n.status, NodeStatus::Pending | NodeStatus::Running) => n.clone(),
            Some(n) if n.status == NodeStatus::Failed => {
                let node = NodeExecution::new(execution.id.clone(), step.id.clone(), n.attempt + 1);
                self.execution_store.save_node(&node).await?;
                node
            }
            _ => {
                let node = NodeExecution::new(execution.id.clone(), step.id.clone(), 1);
                self.execution_store.save_node(&node).await?;
                node
            }
        };
        latest.insert(step.id.clone(), node.clone());

        // Checkpoint gating: an undecided checkpoint halts the execution;
        // a "reject" decision fails the node; anything else releases it.
        if let Some(checkpoint) = self.checkpoints.latest_for_node(&node.id).await? {
            if !checkpoint.is_decided() {
                return Ok(StepOutcome::Halted);
            }
            if checkpoint.decision.as_deref() == Some("reject") {
                let error = match &checkpoint.feedback {
                    Some(feedback) => format!("rejected at checkpoint: {}", feedback),
                    None => "rejected at checkpoint".to_string(),
                };
                return self
                    .fail_node(execution, def, step, node, error, latest)
                    .await;
            }
            // A decided escalation resolves the panel in the arbiter's
            // favor without re-running the reviewers.
            if step.is_review() {
                if let Some(panel) = self.reviews.panel_for_node(&node.id).await? {
                    if panel.outcome == Some(ReviewOutcome::Escalate) {
                        let output = checkpoint
                            .decision
                            .clone()
                            .unwrap_or_else(|| "resolved".to_string());
                        let node = self.complete_node(execution, node, output).await?;
                        latest.insert(step.id.clone(), node);
                        return Ok(StepOutcome::Ran);
                    }
                }
            }
        } else if step.checkpoint {
            self.checkpoints
                .create(
                    &execution.id,
                    Some(&node.id),
                    "approval",
                    Some(format!("Approve step '{}'?", step.id)),
                    vec!["approve".to_string(), "reject".to_string()],
                )
                .await?;
            return Ok(StepOutcome::Halted);
        }

        // Run it.
        if step.is_review() {
            self.run_review_step(execution, def, step, node, latest).await
        } else {
            self.run_agent_step(execution, def, step, node, latest).await
        }
    }

    /// Delegate an agent step through the registry and settle the node.
    async fn run_agent_step(
        &self,
        execution: &mut Execution,
        def: &WorkflowDefinition,
        step: &Step,
        mut node: NodeExecution,
        latest: &mut HashMap<String, NodeExecution>,
    ) -> Result<StepOutcome, CoreError> {
        node.status = NodeStatus::Running;
        node.started_at = Some(Utc::now());
        node.updated_at = Utc::now();
        self.execution_store.save_node(&node).await?;
        self.event_bus
            .emit(EngineEvent::new(
                EngineEventType::NodeStarted,
                Some(execution.id.clone()),
                serde_json::json!({ "stepId": step.id, "attempt": node.attempt }),
            ))
            .await;

        let prompt = self.render_prompt(step, latest);
        let (target, task) = match self.route_step(def, step, &prompt).await {
            Ok(routed) => routed,
            Err(error) => {
                return self
                    .fail_node(execution, def, step, node, error, latest)
                    .await;
            }
        };

        let broker = ToolBroker::new(
            self.gate.clone(),
            execution.id.clone(),
            node.id.clone(),
            step.effective_allowed_tools(def).to_vec(),
            step.effective_denied_tools(def).to_vec(),
        );
        let result = self
            .registry
            .delegate(
                DelegationRequest {
                    from_agent_id: None,
                    to_agent_id: target,
                    task,
                    context: None,
                },
                DelegationContext {
                    session_id: Some(execution.id.clone()),
                    delegated_from: None,
                    tools: Some(broker),
                },
            )
            .await;

        if result.success {
            let node = self
                .complete_node(execution, node, result.output.unwrap_or_default())
                .await?;
            latest.insert(step.id.clone(), node);
            Ok(StepOutcome::Ran)
        } else {
            let error = result
                .error
                .unwrap_or_else(|| "delegation failed".to_string());
            self.fail_node(execution, def, step, node, error, latest)
                .await
        }
    }

    /// Run a review step: collect one vote per configured reviewer, then
    /// aggregate and route on the outcome.
    async fn run_review_step(
        &self,
        execution: &mut Execution,
        def: &WorkflowDefinition,
        step: &Step,
        mut node: NodeExecution,
        latest: &mut HashMap<String, NodeExecution>,
    ) -> Result<StepOutcome, CoreError> {
        let config = step
            .review
            .clone()
            .ok_or_else(|| CoreError::InvalidState(format!(
                "review step '{}' has no review configuration",
                step.id
            )))?;

        node.status = NodeStatus::Running;
        node.started_at = Some(Utc::now());
        node.updated_at = Utc::now();
        self.execution_store.save_node(&node).await?;
        self.event_bus
            .emit(EngineEvent::new(
                EngineEventType::NodeStarted,
                Some(execution.id.clone()),
                serde_json::json!({ "stepId": step.id, "attempt": node.attempt }),
            ))
            .await;

        let panel = self
            .reviews
            .create_panel(&node.id, &execution.id, config.clone())
            .await?;
        self.reviews.start_collecting(&panel.id).await?;

        let prompt = self.render_prompt(step, latest);
        let review_prompt = format!(
            "{}\n\nRespond with:\nVOTE: approve | request_changes | critical | abstain\n\
             FEEDBACK: <your reasoning>\n\
             ISSUES: [{{\"severity\": \"...\", \"description\": \"...\"}}]",
            if prompt.is_empty() {
                format!("Review the output of the steps feeding '{}'", step.id)
            } else {
                prompt
            }
        );

        for reviewer_id in &config.reviewers {
            let result = self
                .registry
                .delegate(
                    DelegationRequest {
                        from_agent_id: None,
                        to_agent_id: reviewer_id.clone(),
                        task: review_prompt.clone(),
                        context: None,
                    },
                    DelegationContext {
                        session_id: Some(execution.id.clone()),
                        delegated_from: None,
                        tools: None,
                    },
                )
                .await;

            let (vote, feedback, issues) = match result {
                ref r if r.success => {
                    let parsed = parse_reviewer_response(r.output.as_deref().unwrap_or(""));
                    (
                        parsed.vote.unwrap_or(VoteKind::Abstain),
                        parsed.feedback,
                        parsed.issues.unwrap_or_default(),
                    )
                }
                r => {
                    // A reviewer that cannot answer abstains rather than
                    // blocking the panel.
                    (
                        VoteKind::Abstain,
                        r.error.unwrap_or_else(|| "reviewer unavailable".to_string()),
                        Vec::new(),
                    )
                }
            };
            self.reviews
                .add_vote(&panel.id, reviewer_id, vote, feedback, issues, 1.0)
                .await?;
        }

        if !self.reviews.has_all_votes(&panel.id).await? {
            tracing::warn!(
                "Review panel {} aggregating without all votes",
                panel.id
            );
        }
        let (outcome, summary) = self.reviews.aggregate(&panel.id).await?;

        match outcome {
            ReviewOutcome::Approved => {
                let node = self
                    .complete_node(execution, node, outcome.as_str().to_string())
                    .await?;
                latest.insert(step.id.clone(), node);
                Ok(StepOutcome::Ran)
            }
            ReviewOutcome::QueueChanges | ReviewOutcome::AddressCritical => {
                let error = format!("review outcome {}: {}", outcome.as_str(), summary.outcome_reason);
                self.fail_node(execution, def, step, node, error, latest)
                    .await
            }
            ReviewOutcome::Escalate => {
                // Hand the disagreement to an arbiter and halt.
                node.status = NodeStatus::Pending;
                node.updated_at = Utc::now();
                self.execution_store.save_node(&node).await?;
                latest.insert(step.id.clone(), node.clone());
                self.checkpoints
                    .create(
                        &execution.id,
                        Some(&node.id),
                        "escalation",
                        Some(format!(
                            "Review of step '{}' escalated: {}",
                            step.id, summary.outcome_reason
                        )),
                        vec!["approve".to_string(), "reject".to_string()],
                    )
                    .await?;
                Ok(StepOutcome::Halted)
            }
        }
    }

    /// Pick the target agent and task text for a step: explicit agent,
    /// else the first prompt mention (clean text becomes the task), else
    /// the workflow default, else the primary agent.
    async fn route_step(
        &self,
        def: &WorkflowDefinition,
        step: &Step,
        prompt: &str,
    ) -> Result<(String, String), String> {
        if let Some(agent) = &step.agent {
            return Ok((agent.clone(), self.task_text(step, prompt)));
        }

        let parse = self.registry.parse_mentions(prompt).await;
        if let Some(mention) = parse.mentions.first() {
            return Ok((mention.agent_id.clone(), self.task_text(step, &parse.clean_text)));
        }

        if let Some(default_agent) = &def.default_agent_id {
            return Ok((default_agent.clone(), self.task_text(step, prompt)));
        }

        match self.registry.primary().await {
            Ok(primary) => Ok((primary.id, self.task_text(step, prompt))),
            Err(_) => Err(format!(
                "no agent to run step '{}': no explicit agent, mention, default, or primary",
                step.id
            )),
        }
    }

    fn task_text(&self, step: &Step, prompt: &str) -> String {
        if !prompt.is_empty() {
            return prompt.to_string();
        }
        match &step.action {
            Some(action) => format!("Perform action '{}' for step '{}'", action, step.id),
            None => format!("Execute step '{}'", step.id),
        }
    }

    /// Resolve `${steps.<id>.output}` references against completed nodes.
    fn render_prompt(&self, step: &Step, latest: &HashMap<String, NodeExecution>) -> String {
        let template = match &step.prompt {
            Some(prompt) => prompt.clone(),
            None => return String::new(),
        };
        let step_re = Regex::new(r"\$\{steps\.([^.}]+)\.output\}").unwrap();
        step_re
            .replace_all(&template, |caps: &regex::Captures| {
                let step_id = &caps[1];
                latest
                    .get(step_id)
                    .filter(|n| n.status == NodeStatus::Success)
                    .and_then(|n| n.output.clone())
                    .unwrap_or_else(|| format!("${{steps.{}.output}}", step_id))
            })
            .to_string()
    }

    async fn complete_node(
        &self,
        execution: &Execution,
        mut node: NodeExecution,
        output: String,
    ) -> Result<NodeExecution, CoreError> {
        node.status = NodeStatus::Success;
        node.output = Some(output);
        node.completed_at = Some(Utc::now());
        node.updated_at = Utc::now();
        self.execution_store.save_node(&node).await?;
        self.event_bus
            .emit(EngineEvent::new(
                EngineEventType::NodeCompleted,
                Some(execution.id.clone()),
                serde_json::json!({ "stepId": node.step_id, "attempt": node.attempt }),
            ))
            .await;
        Ok(node)
    }

    /// Mark a node failed and apply the workflow error policy.
    async fn fail_node(
        &self,
        execution: &mut Execution,
        def: &WorkflowDefinition,
        step: &Step,
        mut node: NodeExecution,
        error: String,
        latest: &mut HashMap<String, NodeExecution>,
    ) -> Result<StepOutcome, CoreError> {
        tracing::warn!(
            "Step '{}' failed in execution {}: {}",
            step.id,
            execution.id,
            error
        );
        node.status = NodeStatus::Failed;
        node.error = Some(error.clone());
        node.completed_at = Some(Utc::now());
        node.updated_at = Utc::now();
        self.execution_store.save_node(&node).await?;
        latest.insert(step.id.clone(), node.clone());
        self.event_bus
            .emit(EngineEvent::new(
                EngineEventType::NodeFailed,
                Some(execution.id.clone()),
                serde_json::json!({ "stepId": step.id, "error": error }),
            ))
            .await;

        match def.on_error {
            OnError::Fail => {
                self.fail_execution(
                    execution.clone(),
                    format!("step '{}' failed: {}", step.id, error),
                )
                .await?;
                Ok(StepOutcome::AbortedExecution)
            }
            OnError::Retry | OnError::Continue => Ok(StepOutcome::Ran),
        }
    }

    async fn skip_node(
        &self,
        execution: &Execution,
        step: &Step,
        latest: &HashMap<String, NodeExecution>,
    ) -> Result<NodeExecution, CoreError> {
        let attempt = latest.get(&step.id).map(|n| n.attempt).unwrap_or(0) + 1;
        let mut node = NodeExecution::new(execution.id.clone(), step.id.clone(), attempt);
        node.status = NodeStatus::Skipped;
        node.completed_at = Some(Utc::now());
        self.execution_store.save_node(&node).await?;
        tracing::info!(
            "Step '{}' skipped in execution {} (dead branch)",
            step.id,
            execution.id
        );
        Ok(node)
    }

    async fn fail_execution(
        &self,
        mut execution: Execution,
        error: String,
    ) -> Result<Execution, CoreError> {
        tracing::error!("Execution {} failed: {}", execution.id, error);
        execution.status = ExecutionStatus::Failed;
        execution.error = Some(error.clone());
        execution.completed_at = Some(Utc::now());
        execution.updated_at = Utc::now();
        self.execution_store.save(&execution).await?;
        self.event_bus
            .emit(EngineEvent::new(
                EngineEventType::ExecutionFailed,
                Some(execution.id.clone()),
                serde_json::json!({ "error": error }),
            ))
            .await;
        Ok(execution)
    }

    /// Latest node execution per step id. Rows arrive oldest first, so
    /// the last row per step wins.
    async fn latest_nodes(
        &self,
        execution_id: &str,
    ) -> Result<HashMap<String, NodeExecution>, CoreError> {
        let nodes = self.execution_store.list_nodes(execution_id).await?;
        let mut latest = HashMap::new();
        for node in nodes {
            latest.insert(node.step_id.clone(), node);
        }
        Ok(latest)
    }
}
