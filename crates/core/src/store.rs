use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::model::{PersistedSnapshot, ProjectId, QuestionId, Response, UploadId, UploadRecord};
use crate::progress::CompletionLookup;

/// In-memory answers and upload records for one project.
///
/// Both collections are keyed by their stable id, so an upsert always
/// replaces and never duplicates. Every effective mutation bumps
/// [`ResponseStore::revision`]; removing an absent key is a no-op and leaves
/// the revision unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseStore {
    responses: BTreeMap<QuestionId, Response>,
    uploads: BTreeMap<UploadId, UploadRecord>,
    revision: u64,
}

impl ResponseStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from a persisted snapshot.
    ///
    /// Should the snapshot list an id twice, the later entry wins, matching
    /// upsert semantics. The resulting store starts at revision 0.
    #[must_use]
    pub fn from_snapshot(snapshot: &PersistedSnapshot) -> Self {
        let responses = snapshot
            .responses
            .iter()
            .map(|r| (r.question_id.clone(), r.clone()))
            .collect();
        let uploads = snapshot
            .uploads
            .iter()
            .map(|u| (u.upload_id.clone(), u.clone()))
            .collect();
        Self {
            responses,
            uploads,
            revision: 0,
        }
    }

    /// Captures the current contents as a snapshot for `project_id`.
    #[must_use]
    pub fn to_snapshot(&self, project_id: ProjectId, saved_at: DateTime<Utc>) -> PersistedSnapshot {
        PersistedSnapshot {
            project_id,
            responses: self.responses.values().cloned().collect(),
            uploads: self.uploads.values().cloned().collect(),
            last_saved_at: saved_at,
        }
    }

    /// Inserts or replaces the answer for `response.question_id`.
    ///
    /// Returns the replaced answer, if any.
    pub fn upsert_response(&mut self, response: Response) -> Option<Response> {
        self.revision += 1;
        self.responses.insert(response.question_id.clone(), response)
    }

    pub fn remove_response(&mut self, question_id: &QuestionId) -> Option<Response> {
        let removed = self.responses.remove(question_id);
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    /// Inserts or replaces the record for `record.upload_id`.
    pub fn upsert_upload(&mut self, record: UploadRecord) -> Option<UploadRecord> {
        self.revision += 1;
        self.uploads.insert(record.upload_id.clone(), record)
    }

    pub fn remove_upload(&mut self, upload_id: &UploadId) -> Option<UploadRecord> {
        let removed = self.uploads.remove(upload_id);
        if removed.is_some() {
            self.revision += 1;
        }
        removed
    }

    /// Drops every answer and upload record.
    pub fn clear(&mut self) {
        if !self.is_empty() {
            self.revision += 1;
        }
        self.responses.clear();
        self.uploads.clear();
    }

    /// True iff an answer exists and carries a non-empty value.
    #[must_use]
    pub fn is_complete(&self, question_id: &QuestionId) -> bool {
        self.responses
            .get(question_id)
            .is_some_and(Response::is_answered)
    }

    /// True iff a record exists with status `completed`.
    #[must_use]
    pub fn is_uploaded(&self, upload_id: &UploadId) -> bool {
        self.uploads
            .get(upload_id)
            .is_some_and(UploadRecord::is_completed)
    }

    #[must_use]
    pub fn response(&self, question_id: &QuestionId) -> Option<&Response> {
        self.responses.get(question_id)
    }

    #[must_use]
    pub fn upload(&self, upload_id: &UploadId) -> Option<&UploadRecord> {
        self.uploads.get(upload_id)
    }

    pub fn responses(&self) -> impl Iterator<Item = &Response> + '_ {
        self.responses.values()
    }

    pub fn uploads(&self) -> impl Iterator<Item = &UploadRecord> + '_ {
        self.uploads.values()
    }

    #[must_use]
    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.uploads.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty() && self.uploads.is_empty()
    }

    /// Monotonic mutation counter.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl CompletionLookup for ResponseStore {
    fn is_question_complete(&self, question_id: &QuestionId) -> bool {
        self.is_complete(question_id)
    }

    fn is_upload_complete(&self, upload_id: &UploadId) -> bool {
        self.is_uploaded(upload_id)
    }
}
