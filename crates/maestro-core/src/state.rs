//! Shared application state wiring the engine's components together.

use std::sync::Arc;

use crate::checkpoint::CheckpointController;
use crate::consensus::ReviewCoordinator;
use crate::db::Database;
use crate::events::EventBus;
use crate::gate::ToolCallGate;
use crate::registry::AgentRegistry;
use crate::store::{
    CheckpointStore, ExecutionStore, ReviewStore, ToolCallStore, WorkflowStore,
};
use crate::workflow::ExecutionEngine;

/// Shared state accessible by all RPC handlers and host adapters.
pub struct AppStateInner {
    pub db: Database,
    pub workflow_store: WorkflowStore,
    pub execution_store: ExecutionStore,
    pub checkpoints: CheckpointController,
    pub gate: ToolCallGate,
    pub reviews: ReviewCoordinator,
    pub registry: AgentRegistry,
    pub event_bus: EventBus,
    pub engine: ExecutionEngine,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(db: Database) -> Self {
        let event_bus = EventBus::new();
        let workflow_store = WorkflowStore::new(db.clone());
        let execution_store = ExecutionStore::new(db.clone());
        let checkpoints =
            CheckpointController::new(CheckpointStore::new(db.clone()), event_bus.clone());
        let gate = ToolCallGate::new(ToolCallStore::new(db.clone()));
        let reviews = ReviewCoordinator::new(ReviewStore::new(db.clone()), event_bus.clone());
        let registry = AgentRegistry::new(event_bus.clone());
        let engine = ExecutionEngine::new(
            workflow_store.clone(),
            execution_store.clone(),
            checkpoints.clone(),
            gate.clone(),
            reviews.clone(),
            registry.clone(),
            event_bus.clone(),
        );
        Self {
            workflow_store,
            execution_store,
            checkpoints,
            gate,
            reviews,
            registry,
            event_bus,
            engine,
            db,
        }
    }
}
