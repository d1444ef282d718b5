//! Agent registry and mention router.
//!
//! One registry is shared by every execution in the process. It owns the
//! agent table, the primary-agent designation, and delegation through the
//! externally supplied executor callback. Delegation reports expected
//! failures as `DelegationResult { success: false, .. }` — a single agent
//! failure never crashes sibling executions.

pub mod mentions;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::events::{EngineEvent, EngineEventType, EventBus};
use crate::gate::ToolBroker;
use crate::models::agent::{
    Agent, AgentConfig, AgentMessage, AgentRole, AgentStatus, DelegationRequest, DelegationResult,
};

pub use mentions::{parse_mentions, MentionParse};

/// Context handed to the executor callback alongside the task text.
#[derive(Clone, Default)]
pub struct DelegationContext {
    pub session_id: Option<String>,
    pub delegated_from: Option<String>,
    pub tools: Option<ToolBroker>,
}

/// The externally supplied agent executor. The host decides what a call
/// actually does (LLM inference, subprocess, stub); the registry only
/// tracks status and usage around it.
pub type AgentExecutorFn = Arc<
    dyn Fn(
            Agent,
            String,
            DelegationContext,
        ) -> Pin<Box<dyn Future<Output = Result<AgentMessage, String>> + Send>>
        + Send
        + Sync,
>;

struct RegistryInner {
    agents: HashMap<String, Agent>,
    primary_id: Option<String>,
}

/// Shared, mutable agent table. Mutations serialize on the inner lock.
#[derive(Clone)]
pub struct AgentRegistry {
    inner: Arc<RwLock<RegistryInner>>,
    executor: Arc<RwLock<Option<AgentExecutorFn>>>,
    event_bus: EventBus,
}

impl AgentRegistry {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                agents: HashMap::new(),
                primary_id: None,
            })),
            executor: Arc::new(RwLock::new(None)),
            event_bus,
        }
    }

    /// Install the executor callback. Delegation soft-fails until one is
    /// configured.
    pub async fn set_executor(&self, executor: AgentExecutorFn) {
        let mut slot = self.executor.write().await;
        *slot = Some(executor);
    }

    /// Register an agent. The first agent registered, or any agent with
    /// role `primary`, becomes the primary.
    pub async fn register(&self, config: AgentConfig) -> Agent {
        let agent = Agent::new(config);
        let mut inner = self.inner.write().await;
        let first = inner.agents.is_empty();
        if first || agent.role == AgentRole::Primary {
            inner.primary_id = Some(agent.id.clone());
        }
        inner.agents.insert(agent.id.clone(), agent.clone());
        tracing::info!("Registered agent {} ({})", agent.name, agent.id);
        agent
    }

    /// Remove an agent. Removing the primary promotes another agent with
    /// role `primary` when one exists, else an arbitrary remaining agent,
    /// else leaves the primary unset.
    pub async fn unregister(&self, agent_id: &str) -> Result<Agent, CoreError> {
        let mut inner = self.inner.write().await;
        let removed = inner
            .agents
            .remove(agent_id)
            .ok_or_else(|| CoreError::NotFound(format!("Agent {} not found", agent_id)))?;

        if inner.primary_id.as_deref() == Some(agent_id) {
            let next = inner
                .agents
                .values()
                .find(|a| a.role == AgentRole::Primary)
                .or_else(|| inner.agents.values().next())
                .map(|a| a.id.clone());
            inner.primary_id = next;
            match &inner.primary_id {
                Some(id) => tracing::info!("Primary agent reassigned to {}", id),
                None => tracing::info!("Registry left with no primary agent"),
            }
        }
        Ok(removed)
    }

    pub async fn get(&self, agent_id: &str) -> Option<Agent> {
        let inner = self.inner.read().await;
        inner.agents.get(agent_id).cloned()
    }

    /// All registered agents, ordered by name for stable output.
    pub async fn list(&self) -> Vec<Agent> {
        let inner = self.inner.read().await;
        let mut agents: Vec<Agent> = inner.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        agents
    }

    /// The designated primary agent.
    pub async fn primary(&self) -> Result<Agent, CoreError> {
        let inner = self.inner.read().await;
        inner
            .primary_id
            .as_ref()
            .and_then(|id| inner.agents.get(id))
            .cloned()
            .ok_or(CoreError::NoPrimaryAgent)
    }

    /// Case-insensitive substring search over id, name, description, and
    /// trigger keywords. Union of matches, unranked.
    pub async fn find(&self, query: &str) -> Vec<Agent> {
        let needle = query.to_lowercase();
        let inner = self.inner.read().await;
        let mut found: Vec<Agent> = inner
            .agents
            .values()
            .filter(|a| {
                a.id.to_lowercase().contains(&needle)
                    || a.name.to_lowercase().contains(&needle)
                    || a.description
                        .as_ref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
                    || a.trigger_keywords
                        .iter()
                        .any(|k| k.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }

    /// Parse a text for `@mentions` of registered agents.
    pub async fn parse_mentions(&self, text: &str) -> MentionParse {
        let inner = self.inner.read().await;
        let agents: Vec<Agent> = inner.agents.values().cloned().collect();
        drop(inner);
        mentions::parse_mentions(text, &agents)
    }

    pub async fn update_status(&self, agent_id: &str, status: AgentStatus) {
        let mut inner = self.inner.write().await;
        if let Some(agent) = inner.agents.get_mut(agent_id) {
            agent.status = status;
        }
    }

    /// Route a task to an agent through the executor callback.
    ///
    /// Never returns `Err` for expected failures: an unknown target, a
    /// missing executor, or an executor exception all come back as
    /// `DelegationResult { success: false, error }`.
    pub async fn delegate(
        &self,
        request: DelegationRequest,
        context: DelegationContext,
    ) -> DelegationResult {
        let started = Instant::now();
        let fail = |agent_id: &str, error: String, started: Instant| DelegationResult {
            success: false,
            agent_id: agent_id.to_string(),
            output: None,
            error: Some(error),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        let target = match self.get(&request.to_agent_id).await {
            Some(agent) => agent,
            None => {
                return fail(
                    &request.to_agent_id,
                    format!("Unknown agent: {}", request.to_agent_id),
                    started,
                );
            }
        };

        let executor = {
            let slot = self.executor.read().await;
            slot.clone()
        };
        let executor = match executor {
            Some(executor) => executor,
            None => {
                return fail(
                    &target.id,
                    "No agent executor configured".to_string(),
                    started,
                );
            }
        };

        self.update_status(&target.id, AgentStatus::Thinking).await;

        let message = match &request.context {
            Some(context) => format!("{}\n\n{}", context, request.task),
            None => request.task.clone(),
        };
        let mut context = context;
        if context.delegated_from.is_none() {
            context.delegated_from = request.from_agent_id.clone();
        }
        let session_id = context.session_id.clone();

        match executor(target.clone(), message, context).await {
            Ok(response) => {
                {
                    let mut inner = self.inner.write().await;
                    if let Some(agent) = inner.agents.get_mut(&target.id) {
                        agent.status = AgentStatus::Idle;
                        agent.message_count += 1;
                        agent.last_active_at = Some(Utc::now());
                        if let Some(usage) = &response.usage {
                            agent.total_usage.add(usage);
                        }
                    }
                }
                let duration_ms = started.elapsed().as_millis() as u64;
                self.event_bus
                    .emit(EngineEvent::new(
                        EngineEventType::AgentDelegated,
                        session_id,
                        serde_json::json!({
                            "agentId": target.id,
                            "fromAgentId": request.from_agent_id,
                            "durationMs": duration_ms,
                        }),
                    ))
                    .await;
                DelegationResult {
                    success: true,
                    agent_id: target.id,
                    output: Some(response.content),
                    error: None,
                    duration_ms,
                }
            }
            Err(error) => {
                self.update_status(&target.id, AgentStatus::Error).await;
                tracing::warn!("Delegation to agent {} failed: {}", target.id, error);
                fail(&target.id, error, started)
            }
        }
    }
}
