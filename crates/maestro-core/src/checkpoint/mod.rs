//! Checkpoint controller — records human/arbiter decision points that
//! pause an execution and release it once a decision lands.
//!
//! A checkpoint is decided at most once: the second decision on the same
//! checkpoint is an `InvalidState` error rather than an overwrite, so an
//! arbiter's recorded input is never silently replaced. Creating a second
//! checkpoint while one is pending is allowed; `pending` reports the most
//! recently created undecided one.

use chrono::Utc;

use crate::error::CoreError;
use crate::events::{EngineEvent, EngineEventType, EventBus};
use crate::models::checkpoint::Checkpoint;
use crate::store::CheckpointStore;

#[derive(Clone)]
pub struct CheckpointController {
    store: CheckpointStore,
    event_bus: EventBus,
}

impl CheckpointController {
    pub fn new(store: CheckpointStore, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    pub async fn create(
        &self,
        execution_id: &str,
        node_execution_id: Option<&str>,
        checkpoint_type: &str,
        prompt_message: Option<String>,
        options: Vec<String>,
    ) -> Result<Checkpoint, CoreError> {
        let checkpoint = Checkpoint::new(
            execution_id.to_string(),
            node_execution_id.map(|s| s.to_string()),
            checkpoint_type.to_string(),
            prompt_message,
            options,
        );
        self.store.save(&checkpoint).await?;
        tracing::info!(
            "Checkpoint {} ({}) created for execution {}",
            checkpoint.id,
            checkpoint.checkpoint_type,
            execution_id
        );
        self.event_bus
            .emit(EngineEvent::new(
                EngineEventType::CheckpointCreated,
                Some(execution_id.to_string()),
                serde_json::json!({
                    "checkpointId": checkpoint.id,
                    "checkpointType": checkpoint.checkpoint_type,
                }),
            ))
            .await;
        Ok(checkpoint)
    }

    pub async fn get(&self, checkpoint_id: &str) -> Result<Option<Checkpoint>, CoreError> {
        self.store.get(checkpoint_id).await
    }

    pub async fn list(&self, execution_id: &str) -> Result<Vec<Checkpoint>, CoreError> {
        self.store.list_by_execution(execution_id).await
    }

    /// The most recently created undecided checkpoint, or None.
    pub async fn pending(&self, execution_id: &str) -> Result<Option<Checkpoint>, CoreError> {
        self.store.latest_pending(execution_id).await
    }

    pub async fn has_pending(&self, execution_id: &str) -> Result<bool, CoreError> {
        Ok(self.pending(execution_id).await?.is_some())
    }

    /// The most recent checkpoint attached to a node execution.
    pub async fn latest_for_node(
        &self,
        node_execution_id: &str,
    ) -> Result<Option<Checkpoint>, CoreError> {
        self.store.latest_for_node(node_execution_id).await
    }

    /// Record a decision. Returns `Ok(false)` and mutates nothing when the
    /// checkpoint does not exist; rejects a second decision on an already
    /// decided checkpoint.
    pub async fn record_decision(
        &self,
        checkpoint_id: &str,
        decision: &str,
        feedback: Option<String>,
    ) -> Result<bool, CoreError> {
        let mut checkpoint = match self.store.get(checkpoint_id).await? {
            Some(checkpoint) => checkpoint,
            None => return Ok(false),
        };
        if checkpoint.is_decided() {
            return Err(CoreError::InvalidState(format!(
                "Checkpoint {} already decided",
                checkpoint_id
            )));
        }

        checkpoint.decision = Some(decision.to_string());
        checkpoint.feedback = feedback;
        checkpoint.decided_at = Some(Utc::now());
        self.store.save(&checkpoint).await?;

        self.event_bus
            .emit(EngineEvent::new(
                EngineEventType::CheckpointDecided,
                Some(checkpoint.execution_id.clone()),
                serde_json::json!({
                    "checkpointId": checkpoint.id,
                    "decision": decision,
                }),
            ))
            .await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn controller() -> CheckpointController {
        CheckpointController::new(
            CheckpointStore::new(Database::open_in_memory().unwrap()),
            EventBus::new(),
        )
    }

    #[tokio::test]
    async fn test_create_and_pending() {
        let ctl = controller();
        assert!(!ctl.has_pending("ex-1").await.unwrap());

        let cp = ctl
            .create("ex-1", None, "approval", Some("Ship it?".to_string()), vec![])
            .await
            .unwrap();
        assert!(ctl.has_pending("ex-1").await.unwrap());
        assert_eq!(ctl.pending("ex-1").await.unwrap().unwrap().id, cp.id);
        assert!(!ctl.has_pending("ex-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_returns_most_recent() {
        let ctl = controller();
        let _first = ctl.create("ex-1", None, "approval", None, vec![]).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = ctl.create("ex-1", None, "escalation", None, vec![]).await.unwrap();

        let pending = ctl.pending("ex-1").await.unwrap().unwrap();
        assert_eq!(pending.id, second.id);
    }

    #[tokio::test]
    async fn test_record_decision() {
        let ctl = controller();
        let cp = ctl
            .create(
                "ex-1",
                None,
                "approval",
                None,
                vec!["approve".to_string(), "reject".to_string()],
            )
            .await
            .unwrap();

        let recorded = ctl
            .record_decision(&cp.id, "approve", Some("lgtm".to_string()))
            .await
            .unwrap();
        assert!(recorded);

        let decided = ctl.get(&cp.id).await.unwrap().unwrap();
        assert_eq!(decided.decision.as_deref(), Some("approve"));
        assert_eq!(decided.feedback.as_deref(), Some("lgtm"));
        assert!(decided.decided_at.is_some());
        assert!(!ctl.has_pending("ex-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_decision_unknown_id_returns_false() {
        let ctl = controller();
        let recorded = ctl.record_decision("missing", "approve", None).await.unwrap();
        assert!(!recorded);
    }

    #[tokio::test]
    async fn test_second_decision_rejected() {
        let ctl = controller();
        let cp = ctl.create("ex-1", None, "approval", None, vec![]).await.unwrap();
        ctl.record_decision(&cp.id, "approve", None).await.unwrap();

        let err = ctl
            .record_decision(&cp.id, "reject", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        // The original decision is untouched.
        let decided = ctl.get(&cp.id).await.unwrap().unwrap();
        assert_eq!(decided.decision.as_deref(), Some("approve"));
    }
}
