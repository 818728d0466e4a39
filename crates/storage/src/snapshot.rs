use std::sync::Arc;

use certify_core::model::{PersistedSnapshot, ProjectId};
use tracing::debug;

use crate::repository::{KeyValueStore, StorageError};

const KEY_PREFIX: &str = "questionnaire_";

/// Durable key for a project's snapshot: `questionnaire_<projectId>`.
#[must_use]
pub fn snapshot_key(project_id: &ProjectId) -> String {
    format!("{KEY_PREFIX}{project_id}")
}

/// JSON codec for [`PersistedSnapshot`] on top of a [`KeyValueStore`].
#[derive(Clone)]
pub struct SnapshotRepository {
    kv: Arc<dyn KeyValueStore>,
}

impl SnapshotRepository {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Load the snapshot for `project_id`, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for unreadable payloads and
    /// `StorageError::Conflict` when the payload belongs to another project.
    pub async fn load(
        &self,
        project_id: &ProjectId,
    ) -> Result<Option<PersistedSnapshot>, StorageError> {
        let key = snapshot_key(project_id);
        let Some(raw) = self.kv.get(&key).await? else {
            debug!(%key, "no snapshot stored");
            return Ok(None);
        };
        let snapshot = decode(&raw)?;
        if snapshot.project_id != *project_id {
            return Err(StorageError::Conflict);
        }
        Ok(Some(snapshot))
    }

    /// Overwrite the stored snapshot for `snapshot.project_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or the backend write fails.
    pub async fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), StorageError> {
        let key = snapshot_key(&snapshot.project_id);
        let raw = encode(snapshot)?;
        self.kv.set(&key, &raw).await?;
        debug!(
            %key,
            responses = snapshot.responses.len(),
            uploads = snapshot.uploads.len(),
            "snapshot written"
        );
        Ok(())
    }

    /// Remove the stored snapshot. Succeeds when none exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be reached.
    pub async fn delete(&self, project_id: &ProjectId) -> Result<(), StorageError> {
        self.kv.remove(&snapshot_key(project_id)).await
    }
}

pub(crate) fn encode(snapshot: &PersistedSnapshot) -> Result<String, StorageError> {
    serde_json::to_string(snapshot).map_err(|e| StorageError::Serialization(e.to_string()))
}

pub(crate) fn decode(raw: &str) -> Result<PersistedSnapshot, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))
}
