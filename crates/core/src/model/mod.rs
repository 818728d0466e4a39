mod catalog;
mod ids;
mod response;
mod snapshot;
mod upload;
mod validation;

pub use catalog::{Catalog, CatalogError, Category, Kpi, Question, QuestionKind, UploadSlot};
pub use ids::{CategoryId, KpiId, ParseIdError, ProjectId, QuestionId, UploadId};
pub use response::{Response, ResponseValue};
pub use snapshot::PersistedSnapshot;
pub use upload::{FileMeta, StorageHandle, UploadRecord, UploadStatus};
pub use validation::ValidationError;
