use serde::{Deserialize, Serialize};

use crate::model::ids::UploadId;

//
// ─── FILE METADATA ─────────────────────────────────────────────────────────────
//

/// Metadata for a user-supplied document.
///
/// File bytes never travel with this type; they live behind a
/// [`StorageHandle`] owned by whatever object store the caller uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub name: String,
    pub size_bytes: u64,
    pub extension: String,
}

impl FileMeta {
    /// Builds metadata from a file name, deriving the extension from the
    /// last `.` segment (lowercased, empty when there is none).
    #[must_use]
    pub fn from_file_name(name: impl Into<String>, size_bytes: u64) -> Self {
        let name = name.into();
        let extension = name
            .rsplit_once('.')
            .map(|(stem, ext)| if stem.is_empty() { "" } else { ext })
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self {
            name,
            size_bytes,
            extension,
        }
    }

    /// Extension without a leading dot, lowercased.
    #[must_use]
    pub fn normalized_extension(&self) -> String {
        normalize_extension(&self.extension)
    }
}

pub(crate) fn normalize_extension(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Opaque reference into an external object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageHandle(String);

impl StorageHandle {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//
// ─── UPLOAD RECORD ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Completed,
    Failed,
}

/// Runtime state of one required document slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub upload_id: UploadId,
    pub file_meta: FileMeta,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_handle: Option<StorageHandle>,
}

impl UploadRecord {
    #[must_use]
    pub fn pending(upload_id: UploadId, file_meta: FileMeta) -> Self {
        Self {
            upload_id,
            file_meta,
            status: UploadStatus::Pending,
            error: None,
            storage_handle: None,
        }
    }

    #[must_use]
    pub fn completed(upload_id: UploadId, file_meta: FileMeta) -> Self {
        Self {
            status: UploadStatus::Completed,
            ..Self::pending(upload_id, file_meta)
        }
    }

    #[must_use]
    pub fn failed(upload_id: UploadId, file_meta: FileMeta, error: impl Into<String>) -> Self {
        Self {
            status: UploadStatus::Failed,
            error: Some(error.into()),
            ..Self::pending(upload_id, file_meta)
        }
    }

    #[must_use]
    pub fn with_storage_handle(mut self, handle: StorageHandle) -> Self {
        self.storage_handle = Some(handle);
        self
    }

    pub fn mark_completed(&mut self) {
        self.status = UploadStatus::Completed;
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = UploadStatus::Failed;
        self.error = Some(error.into());
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == UploadStatus::Completed
    }
}
