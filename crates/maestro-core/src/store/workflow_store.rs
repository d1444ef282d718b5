use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::CoreError;
use crate::workflow::schema::WorkflowDefinition;

/// A stored workflow row: the definition plus store-level metadata.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredWorkflow {
    pub definition: WorkflowDefinition,
    pub is_default: bool,
}

#[derive(Clone)]
pub struct WorkflowStore {
    db: Database,
}

impl WorkflowStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or replace a workflow definition. The definition is stored
    /// whole as JSON; updates replace the row.
    pub async fn save(&self, def: &WorkflowDefinition) -> Result<(), CoreError> {
        let d = def.clone();
        let json = serde_json::to_string(&d)
            .map_err(|e| CoreError::Internal(format!("Failed to serialize workflow: {}", e)))?;
        let now = Utc::now().timestamp_millis();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO workflows (id, name, definition, is_default, created_at, updated_at)
                     VALUES (?1, ?2, ?3, 0, ?4, ?4)
                     ON CONFLICT(id) DO UPDATE SET
                       name = excluded.name,
                       definition = excluded.definition,
                       updated_at = excluded.updated_at",
                    rusqlite::params![d.id, d.name, json, now],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, workflow_id: &str) -> Result<Option<StoredWorkflow>, CoreError> {
        let id = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT definition, is_default FROM workflows WHERE id = ?1",
                )?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_workflow(row)))
                    .optional()
            })
            .await
            .map(|opt| opt.flatten())
    }

    pub async fn list(&self) -> Result<Vec<StoredWorkflow>, CoreError> {
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT definition, is_default FROM workflows ORDER BY created_at DESC",
                )?;
                let rows = stmt
                    .query_map([], |row| Ok(row_to_workflow(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows.into_iter().flatten().collect())
            })
            .await
    }

    pub async fn delete(&self, workflow_id: &str) -> Result<bool, CoreError> {
        let id = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let changed =
                    conn.execute("DELETE FROM workflows WHERE id = ?1", rusqlite::params![id])?;
                Ok(changed > 0)
            })
            .await
    }

    /// The workflow currently flagged default, if any. At most one row
    /// carries the flag; `set_default` maintains that.
    pub async fn get_default(&self) -> Result<Option<StoredWorkflow>, CoreError> {
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT definition, is_default FROM workflows WHERE is_default = 1 LIMIT 1",
                )?;
                stmt.query_row([], |row| Ok(row_to_workflow(row))).optional()
            })
            .await
            .map(|opt| opt.flatten())
    }

    /// Flag one workflow as the default, clearing any previous default in
    /// the same logical operation.
    pub async fn set_default(&self, workflow_id: &str) -> Result<(), CoreError> {
        let id = workflow_id.to_string();
        let now = Utc::now().timestamp_millis();
        let found = self
            .db
            .with_conn_async(move |conn| {
                conn.execute("UPDATE workflows SET is_default = 0 WHERE is_default = 1", [])?;
                let changed = conn.execute(
                    "UPDATE workflows SET is_default = 1, updated_at = ?1 WHERE id = ?2",
                    rusqlite::params![now, id],
                )?;
                Ok(changed > 0)
            })
            .await?;
        if found {
            Ok(())
        } else {
            Err(CoreError::NotFound(format!(
                "Workflow {} not found",
                workflow_id
            )))
        }
    }
}

fn row_to_workflow(row: &rusqlite::Row<'_>) -> Option<StoredWorkflow> {
    let json: String = row.get(0).unwrap_or_default();
    let is_default: i64 = row.get(1).unwrap_or(0);
    match serde_json::from_str::<WorkflowDefinition>(&json) {
        Ok(definition) => Some(StoredWorkflow {
            definition,
            is_default: is_default != 0,
        }),
        Err(e) => {
            tracing::error!("Failed to deserialize stored workflow: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(name: &str) -> WorkflowDefinition {
        WorkflowDefinition::from_yaml(&format!(
            r#"
name: {}
steps:
  - id: only
"#,
            name
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_get_list_delete() {
        let store = WorkflowStore::new(Database::open_in_memory().unwrap());
        let def = definition("alpha");
        store.save(&def).await.unwrap();

        let loaded = store.get(&def.id).await.unwrap().unwrap();
        assert_eq!(loaded.definition.name, "alpha");
        assert!(!loaded.is_default);

        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(store.delete(&def.id).await.unwrap());
        assert!(store.get(&def.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_single_default_invariant() {
        let store = WorkflowStore::new(Database::open_in_memory().unwrap());
        let a = definition("a");
        let b = definition("b");
        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();

        store.set_default(&a.id).await.unwrap();
        assert_eq!(store.get_default().await.unwrap().unwrap().definition.id, a.id);

        store.set_default(&b.id).await.unwrap();
        let stored = store.get_default().await.unwrap().unwrap();
        assert_eq!(stored.definition.id, b.id);

        let defaults: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .filter(|w| w.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
    }

    #[tokio::test]
    async fn test_set_default_unknown_id() {
        let store = WorkflowStore::new(Database::open_in_memory().unwrap());
        let err = store.set_default("missing").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
