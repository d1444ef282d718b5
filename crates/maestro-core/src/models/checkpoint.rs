use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pause point requiring a recorded human/arbiter decision before the
/// owning execution resumes. `decided_at` is set at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: String,
    pub execution_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_execution_id: Option<String>,
    pub checkpoint_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_message: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    pub fn new(
        execution_id: String,
        node_execution_id: Option<String>,
        checkpoint_type: String,
        prompt_message: Option<String>,
        options: Vec<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            execution_id,
            node_execution_id,
            checkpoint_type,
            prompt_message,
            options,
            decision: None,
            feedback: None,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    pub fn is_decided(&self) -> bool {
        self.decided_at.is_some()
    }
}
