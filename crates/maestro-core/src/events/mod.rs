//! Event bus — publish/subscribe notifications for engine lifecycle.
//!
//! The bus is passed into the registry and the execution engine at
//! construction; there is no module-level instance. Handlers are
//! fire-and-forget and never block the emitter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineEventType {
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    NodeStarted,
    NodeCompleted,
    NodeFailed,
    CheckpointCreated,
    CheckpointDecided,
    PanelCompleted,
    AgentDelegated,
}

impl EngineEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExecutionStarted => "execution_started",
            Self::ExecutionCompleted => "execution_completed",
            Self::ExecutionFailed => "execution_failed",
            Self::NodeStarted => "node_started",
            Self::NodeCompleted => "node_completed",
            Self::NodeFailed => "node_failed",
            Self::CheckpointCreated => "checkpoint_created",
            Self::CheckpointDecided => "checkpoint_decided",
            Self::PanelCompleted => "panel_completed",
            Self::AgentDelegated => "agent_delegated",
        }
    }
}

/// An event emitted by the engine or the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineEvent {
    #[serde(rename = "type")]
    pub event_type: EngineEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl EngineEvent {
    pub fn new(
        event_type: EngineEventType,
        execution_id: Option<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_type,
            execution_id,
            data,
            timestamp: Utc::now(),
        }
    }
}

type EventHandler = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// Thread-safe event bus.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<HashMap<String, EventHandler>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe to events with a handler function.
    pub async fn on<F>(&self, key: &str, handler: F)
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().await;
        handlers.insert(key.to_string(), Arc::new(handler));
    }

    /// Unsubscribe a handler.
    pub async fn off(&self, key: &str) {
        let mut handlers = self.handlers.write().await;
        handlers.remove(key);
    }

    /// Publish an event to all handlers. Fire and forget.
    pub async fn emit(&self, event: EngineEvent) {
        let handlers = self.handlers.read().await;
        for handler in handlers.values() {
            let handler = handler.clone();
            let event = event.clone();
            tokio::spawn(async move {
                handler(event);
            });
        }
    }
}
