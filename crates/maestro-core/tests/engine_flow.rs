//! Integration tests: drive full workflow executions through the engine
//! with a scripted agent executor.

use std::sync::{Arc, Mutex};

use maestro_core::db::Database;
use maestro_core::models::agent::{AgentConfig, AgentMessage, AgentRole};
use maestro_core::models::execution::{ExecutionStatus, NodeStatus};
use maestro_core::models::review::ReviewOutcome;
use maestro_core::models::tool_call::ToolCallStatus;
use maestro_core::registry::AgentExecutorFn;
use maestro_core::state::{AppState, AppStateInner};
use maestro_core::workflow::WorkflowDefinition;

type CallLog = Arc<Mutex<Vec<(String, String)>>>;

fn state() -> AppState {
    Arc::new(AppStateInner::new(Database::open_in_memory().unwrap()))
}

/// Scripted executor: behavior keyed off the agent name.
///
/// - `Approver*` → VOTE: approve
/// - `Changer`   → VOTE: request_changes with one issue
/// - `Critic`    → VOTE: critical with a critical issue
/// - `Silent`    → VOTE: abstain
/// - `Flaky`     → fails on the first call, succeeds afterwards
/// - `Broken`    → always fails
/// - anything else → echoes the task
fn scripted_executor(log: CallLog, flaky_calls: Arc<Mutex<u32>>) -> AgentExecutorFn {
    Arc::new(move |agent, message, context| {
        let log = log.clone();
        let flaky_calls = flaky_calls.clone();
        Box::pin(async move {
            log.lock().unwrap().push((agent.name.clone(), message.clone()));

            if let Some(tools) = &context.tools {
                if message.contains("use your tools") {
                    tools
                        .request("search", serde_json::json!({"q": "docs"}))
                        .await
                        .map_err(|e| e.to_string())?;
                    tools
                        .request("shell", serde_json::json!({"cmd": "rm -rf /"}))
                        .await
                        .map_err(|e| e.to_string())?;
                }
            }

            let content = if agent.name.starts_with("Approver") {
                "VOTE: approve\nFEEDBACK: looks good".to_string()
            } else if agent.name == "Changer" {
                "VOTE: request_changes\nFEEDBACK: needs work\n\
                 ISSUES: [{\"severity\": \"major\", \"description\": \"missing tests\"}]"
                    .to_string()
            } else if agent.name == "Critic" {
                "VOTE: critical\nFEEDBACK: unsafe\n\
                 ISSUES: [{\"severity\": \"critical\", \"description\": \"data loss\"}]"
                    .to_string()
            } else if agent.name == "Silent" {
                "VOTE: abstain\nFEEDBACK: out of my depth".to_string()
            } else if agent.name == "Flaky" {
                let mut calls = flaky_calls.lock().unwrap();
                *calls += 1;
                if *calls == 1 {
                    return Err("transient failure".to_string());
                }
                format!("recovered: {}", message)
            } else if agent.name == "Broken" {
                return Err("permanently broken".to_string());
            } else {
                format!("done[{}]: {}", agent.name, message)
            };
            Ok(AgentMessage {
                content,
                usage: None,
            })
        })
    })
}

async fn setup(agents: &[(&str, &str)]) -> (AppState, CallLog) {
    let state = state();
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    for (id, name) in agents {
        state
            .registry
            .register(AgentConfig {
                id: Some(id.to_string()),
                name: name.to_string(),
                role: AgentRole::Specialist,
                description: None,
                trigger_keywords: Vec::new(),
            })
            .await;
    }
    state
        .registry
        .set_executor(scripted_executor(log.clone(), Arc::new(Mutex::new(0))))
        .await;
    (state, log)
}

async fn store_workflow(state: &AppState, yaml: &str) -> String {
    let def = WorkflowDefinition::from_yaml(yaml).unwrap();
    state.workflow_store.save(&def).await.unwrap();
    def.id
}

#[tokio::test]
async fn test_linear_flow_chains_outputs() {
    let (state, log) = setup(&[("lead", "Lead"), ("writer", "Writer")]).await;
    let workflow_id = store_workflow(
        &state,
        r#"
name: linear
defaultAgentId: lead
steps:
  - id: draft
    agent: writer
    prompt: "Draft the notes"
  - id: summarize
    depends: [draft]
    prompt: "Summarize: ${steps.draft.output}"
"#,
    )
    .await;

    let execution = state.engine.start(&workflow_id).await.unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert!(execution.iteration <= 3);

    let nodes = state.execution_store.list_nodes(&execution.id).await.unwrap();
    assert_eq!(nodes.len(), 2);
    assert!(nodes.iter().all(|n| n.status == NodeStatus::Success));

    let calls = log.lock().unwrap();
    assert_eq!(calls[0].0, "Writer");
    // The second step's prompt embeds the first step's output.
    assert_eq!(calls[1].0, "Lead");
    assert!(calls[1].1.contains("done[Writer]: Draft the notes"));
}

#[tokio::test]
async fn test_mention_routing_strips_mention_from_task() {
    let (state, log) = setup(&[("lead", "Lead"), ("tech", "Tech")]).await;
    let workflow_id = store_workflow(
        &state,
        r#"
name: mention
steps:
  - id: only
    prompt: "@Tech please summarize the findings"
"#,
    )
    .await;

    let execution = state.engine.start(&workflow_id).await.unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);

    let calls = log.lock().unwrap();
    assert_eq!(calls.len(), 1);
    // Routed to the mentioned agent, not the primary, with the mention
    // stripped from the task.
    assert_eq!(calls[0].0, "Tech");
    assert_eq!(calls[0].1, "please summarize the findings");
}

#[tokio::test]
async fn test_checkpoint_pauses_and_resumes() {
    let (state, _log) = setup(&[("lead", "Lead")]).await;
    let workflow_id = store_workflow(
        &state,
        r#"
name: gated
steps:
  - id: prep
    prompt: "Prepare"
  - id: publish
    depends: [prep]
    checkpoint: true
    prompt: "Publish"
"#,
    )
    .await;

    let execution = state.engine.start(&workflow_id).await.unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::AwaitingCheckpoint);

    let checkpoint = state
        .checkpoints
        .pending(&execution.id)
        .await
        .unwrap()
        .expect("a pending checkpoint");
    assert_eq!(checkpoint.checkpoint_type, "approval");

    // Running again without a decision stays halted.
    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::AwaitingCheckpoint);

    state
        .checkpoints
        .record_decision(&checkpoint.id, "approve", None)
        .await
        .unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);

    let nodes = state.execution_store.list_nodes(&execution.id).await.unwrap();
    assert!(nodes.iter().all(|n| n.status == NodeStatus::Success));
}

#[tokio::test]
async fn test_checkpoint_reject_fails_execution() {
    let (state, _log) = setup(&[("lead", "Lead")]).await;
    let workflow_id = store_workflow(
        &state,
        r#"
name: rejected
steps:
  - id: publish
    checkpoint: true
    prompt: "Publish"
"#,
    )
    .await;

    let execution = state.engine.start(&workflow_id).await.unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    let checkpoint = state
        .checkpoints
        .pending(&execution.id)
        .await
        .unwrap()
        .unwrap();
    state
        .checkpoints
        .record_decision(&checkpoint.id, "reject", Some("not ready".to_string()))
        .await
        .unwrap();

    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error.unwrap().contains("not ready"));
}

#[tokio::test]
async fn test_on_error_fail_aborts_execution() {
    let (state, _log) = setup(&[("broken", "Broken"), ("lead", "Lead")]).await;
    let workflow_id = store_workflow(
        &state,
        r#"
name: fragile
steps:
  - id: a
    agent: broken
  - id: b
    depends: [a]
    agent: lead
"#,
    )
    .await;

    let execution = state.engine.start(&workflow_id).await.unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error.unwrap().contains("permanently broken"));

    // The dependent step never ran.
    let nodes = state.execution_store.list_nodes(&execution.id).await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].step_id, "a");
}

#[tokio::test]
async fn test_on_error_continue_skips_dead_branch() {
    let (state, log) = setup(&[("broken", "Broken"), ("lead", "Lead")]).await;
    let workflow_id = store_workflow(
        &state,
        r#"
name: resilient
onError: continue
steps:
  - id: a
    agent: broken
  - id: b
    depends: [a]
    agent: lead
  - id: c
    agent: lead
    prompt: "Independent work"
"#,
    )
    .await;

    let execution = state.engine.start(&workflow_id).await.unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);

    let nodes = state.execution_store.list_nodes(&execution.id).await.unwrap();
    let status_of = |step: &str| {
        nodes
            .iter()
            .filter(|n| n.step_id == step)
            .next_back()
            .unwrap()
            .status
    };
    assert_eq!(status_of("a"), NodeStatus::Failed);
    assert_eq!(status_of("b"), NodeStatus::Skipped);
    assert_eq!(status_of("c"), NodeStatus::Success);

    // Only the independent step reached an agent besides the failure.
    let calls = log.lock().unwrap();
    assert_eq!(
        calls
            .iter()
            .filter(|(agent, _)| agent == "Lead")
            .count(),
        1
    );
}

#[tokio::test]
async fn test_on_error_retry_recovers() {
    let state = state();
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    state
        .registry
        .register(AgentConfig {
            id: Some("flaky".to_string()),
            name: "Flaky".to_string(),
            role: AgentRole::Specialist,
            description: None,
            trigger_keywords: Vec::new(),
        })
        .await;
    state
        .registry
        .set_executor(scripted_executor(log.clone(), Arc::new(Mutex::new(0))))
        .await;

    let workflow_id = store_workflow(
        &state,
        r#"
name: retried
onError: retry
steps:
  - id: wobbly
    agent: flaky
    prompt: "try hard"
"#,
    )
    .await;

    let execution = state.engine.start(&workflow_id).await.unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);

    let nodes = state.execution_store.list_nodes(&execution.id).await.unwrap();
    let last = nodes.iter().filter(|n| n.step_id == "wobbly").next_back().unwrap();
    assert_eq!(last.status, NodeStatus::Success);
    assert_eq!(last.attempt, 2);
}

#[tokio::test]
async fn test_iteration_cap_is_fatal() {
    let (state, _log) = setup(&[("broken", "Broken")]).await;
    let workflow_id = store_workflow(
        &state,
        r#"
name: doomed
onError: retry
maxIterations: 3
steps:
  - id: hopeless
    agent: broken
"#,
    )
    .await;

    let execution = state.engine.start(&workflow_id).await.unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error.unwrap().contains("iteration cap"));
    assert_eq!(execution.iteration, 4);
}

#[tokio::test]
async fn test_review_step_approved() {
    let (state, _log) = setup(&[
        ("lead", "Lead"),
        ("r1", "Approver One"),
        ("r2", "Approver Two"),
    ])
    .await;
    let workflow_id = store_workflow(
        &state,
        r#"
name: reviewed
steps:
  - id: draft
    agent: lead
    prompt: "Draft"
  - id: review
    type: review
    depends: [draft]
    prompt: "Review: ${steps.draft.output}"
    review:
      reviewers: [r1, r2]
      voting:
        strategy: unanimous
"#,
    )
    .await;

    let execution = state.engine.start(&workflow_id).await.unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);

    let nodes = state.execution_store.list_nodes(&execution.id).await.unwrap();
    let review = nodes.iter().find(|n| n.step_id == "review").unwrap();
    assert_eq!(review.status, NodeStatus::Success);

    let panel = state
        .reviews
        .panel_for_node(&review.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(panel.outcome, Some(ReviewOutcome::Approved));
    assert_eq!(panel.summary.unwrap().abstain_count, 0);
}

#[tokio::test]
async fn test_review_queue_changes_fails_node() {
    let (state, _log) = setup(&[("lead", "Lead"), ("r1", "Approver One"), ("r2", "Changer")]).await;
    let workflow_id = store_workflow(
        &state,
        r#"
name: contested
steps:
  - id: draft
    agent: lead
  - id: review
    type: review
    depends: [draft]
    review:
      reviewers: [r1, r2]
      voting:
        strategy: weighted_threshold
"#,
    )
    .await;

    let execution = state.engine.start(&workflow_id).await.unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    // approval 50% < 70%, changes 50% >= 40% → queue_changes → node fails,
    // and the default error policy aborts the execution.
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error.unwrap().contains("queue_changes"));
}

#[tokio::test]
async fn test_review_escalation_resolved_by_arbiter() {
    let (state, _log) = setup(&[("lead", "Lead"), ("r1", "Silent")]).await;
    let workflow_id = store_workflow(
        &state,
        r#"
name: escalated
steps:
  - id: draft
    agent: lead
  - id: review
    type: review
    depends: [draft]
    review:
      reviewers: [r1]
"#,
    )
    .await;

    // A lone abstention cannot meet quorum → escalate → arbiter checkpoint.
    let execution = state.engine.start(&workflow_id).await.unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::AwaitingCheckpoint);

    let checkpoint = state
        .checkpoints
        .pending(&execution.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.checkpoint_type, "escalation");

    state
        .checkpoints
        .record_decision(&checkpoint.id, "approve", Some("fine by me".to_string()))
        .await
        .unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);

    let nodes = state.execution_store.list_nodes(&execution.id).await.unwrap();
    let review = nodes.iter().find(|n| n.step_id == "review").unwrap();
    assert_eq!(review.status, NodeStatus::Success);
    assert_eq!(review.output.as_deref(), Some("approve"));
}

#[tokio::test]
async fn test_tool_broker_enforces_effective_lists() {
    let (state, _log) = setup(&[("lead", "Lead")]).await;
    let workflow_id = store_workflow(
        &state,
        r#"
name: tooling
defaultAllowedTools: [search]
steps:
  - id: work
    agent: lead
    prompt: "use your tools"
"#,
    )
    .await;

    let execution = state.engine.start(&workflow_id).await.unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::Completed);

    let calls = state
        .gate
        .list_by_execution(&execution.id, None, None)
        .await
        .unwrap();
    assert_eq!(calls.len(), 2);
    let status_of = |tool: &str| calls.iter().find(|c| c.tool_name == tool).unwrap().status;
    assert_eq!(status_of("search"), ToolCallStatus::Approved);
    assert_eq!(status_of("shell"), ToolCallStatus::Denied);

    let counts = state.gate.count_by_status(&execution.id).await.unwrap();
    assert_eq!(counts["approved"], 1);
    assert_eq!(counts["denied"], 1);
}

#[tokio::test]
async fn test_delete_execution_cleans_owned_rows() {
    let (state, _log) = setup(&[("lead", "Lead")]).await;
    let workflow_id = store_workflow(
        &state,
        r#"
name: cleanup
defaultAllowedTools: [search]
steps:
  - id: work
    agent: lead
    prompt: "use your tools"
  - id: gate
    depends: [work]
    checkpoint: true
"#,
    )
    .await;

    let execution = state.engine.start(&workflow_id).await.unwrap();
    let execution = state.engine.run(&execution.id).await.unwrap();
    assert_eq!(execution.status, ExecutionStatus::AwaitingCheckpoint);
    assert!(!state
        .gate
        .list_by_execution(&execution.id, None, None)
        .await
        .unwrap()
        .is_empty());

    assert!(state.execution_store.delete(&execution.id).await.unwrap());
    assert!(state
        .execution_store
        .get(&execution.id)
        .await
        .unwrap()
        .is_none());
    assert!(state
        .checkpoints
        .list(&execution.id)
        .await
        .unwrap()
        .is_empty());
    assert!(state
        .gate
        .list_by_execution(&execution.id, None, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_cyclic_workflow_rejected_at_start() {
    let (state, _log) = setup(&[("lead", "Lead")]).await;
    let def = WorkflowDefinition::from_yaml(
        r#"
name: cyclic
steps:
  - id: a
    depends: [b]
  - id: b
    depends: [a]
"#,
    )
    .unwrap();
    // The store itself does not validate; the engine does before running.
    state.workflow_store.save(&def).await.unwrap();

    let err = state.engine.start(&def.id).await.unwrap_err();
    assert!(matches!(err, maestro_core::CoreError::Validation(_)));
}
