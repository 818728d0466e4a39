//! Shared error types for the services crate.

use chrono::{DateTime, Utc};
use thiserror::Error;

use certify_core::model::{CatalogError, UploadId, ValidationError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `PersistenceManager`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistenceError {
    #[error("durable storage failed: {0}")]
    Storage(#[source] StorageError),
    #[error("stored snapshot is unreadable: {0}")]
    Corrupt(String),
    #[error("stored snapshot belongs to another project")]
    ForeignSnapshot,
    #[error("snapshot changed underneath (expected {expected:?}, found {found:?})")]
    ConcurrentOverwrite {
        expected: Option<DateTime<Utc>>,
        found: Option<DateTime<Utc>>,
    },
}

impl PersistenceError {
    /// True when repeating the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<StorageError> for PersistenceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Serialization(msg) => Self::Corrupt(msg),
            StorageError::Conflict => Self::ForeignSnapshot,
            other => Self::Storage(other),
        }
    }
}

/// Errors emitted by `QuestionnaireService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionnaireError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no file registered for upload slot {0}")]
    UploadNotRegistered(UploadId),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("cannot read catalog file {path}: {source}")]
    CatalogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
