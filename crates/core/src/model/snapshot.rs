use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::ProjectId;
use crate::model::response::Response;
use crate::model::upload::UploadRecord;

/// Durable shape of a project's questionnaire state.
///
/// Only explicit saves produce one. The dirty/saving lifecycle is runtime
/// state and never written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub project_id: ProjectId,
    #[serde(default)]
    pub responses: Vec<Response>,
    #[serde(default)]
    pub uploads: Vec<UploadRecord>,
    pub last_saved_at: DateTime<Utc>,
}
