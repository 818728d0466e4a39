use std::sync::Arc;

use tracing::debug;

use certify_core::Clock;
use certify_core::model::{
    Catalog, CategoryId, FileMeta, KpiId, QuestionId, Response, ResponseValue, StorageHandle,
    UploadId, UploadRecord, ValidationError,
};
use certify_core::progress::{self, CategoryProgress, KpiProgress, OverallProgress};

use crate::error::QuestionnaireError;
use crate::persistence::{PersistenceManager, SaveOutcome, SaveState};

/// Validates user input against the catalog and routes it into the
/// project's store; answers progress queries.
#[derive(Clone)]
pub struct QuestionnaireService {
    clock: Clock,
    catalog: Arc<Catalog>,
    persistence: Arc<PersistenceManager>,
}

impl QuestionnaireService {
    #[must_use]
    pub fn new(clock: Clock, catalog: Arc<Catalog>, persistence: Arc<PersistenceManager>) -> Self {
        Self {
            clock,
            catalog,
            persistence,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }

    #[must_use]
    pub fn state(&self) -> SaveState {
        self.persistence.state()
    }

    // ─── Answers ───────────────────────────────────────────────────────────────

    /// Validate and upsert an answer, stamped with the service clock.
    ///
    /// # Errors
    ///
    /// Returns `QuestionnaireError::Catalog` for unknown questions and
    /// `QuestionnaireError::Validation` for values that do not fit the question.
    pub fn answer(
        &self,
        question_id: &QuestionId,
        value: impl Into<ResponseValue>,
    ) -> Result<(), QuestionnaireError> {
        let question = self.catalog.question(question_id)?;
        let value = value.into();
        question.check_value(&value)?;
        let response = Response::new(question_id.clone(), value, self.clock.now());
        self.persistence.mutate(|store| store.upsert_response(response));
        debug!(question = %question_id, "answer recorded");
        Ok(())
    }

    /// Remove an answer. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `QuestionnaireError::Catalog` for unknown questions.
    pub fn clear_answer(&self, question_id: &QuestionId) -> Result<bool, QuestionnaireError> {
        self.catalog.question(question_id)?;
        let removed = self
            .persistence
            .mutate(|store| store.remove_response(question_id));
        Ok(removed.is_some())
    }

    #[must_use]
    pub fn response(&self, question_id: &QuestionId) -> Option<Response> {
        self.persistence
            .read(|store| store.response(question_id).cloned())
    }

    #[must_use]
    pub fn is_complete(&self, question_id: &QuestionId) -> bool {
        self.persistence.read(|store| store.is_complete(question_id))
    }

    // ─── Uploads ───────────────────────────────────────────────────────────────

    /// Validate a file against its slot and record it as already stored.
    ///
    /// # Errors
    ///
    /// Returns `QuestionnaireError::Catalog` for unknown slots and
    /// `QuestionnaireError::Validation` for rejected files.
    pub fn attach_upload(
        &self,
        upload_id: &UploadId,
        file_meta: FileMeta,
        handle: Option<StorageHandle>,
    ) -> Result<(), QuestionnaireError> {
        let mut record = self.checked_record(upload_id, file_meta, handle)?;
        record.mark_completed();
        self.persistence.mutate(|store| store.upsert_upload(record));
        debug!(upload = %upload_id, "upload attached");
        Ok(())
    }

    /// Validate a file and record it as pending while bytes are transferred
    /// elsewhere.
    ///
    /// # Errors
    ///
    /// Same as [`QuestionnaireService::attach_upload`].
    pub fn begin_upload(
        &self,
        upload_id: &UploadId,
        file_meta: FileMeta,
        handle: Option<StorageHandle>,
    ) -> Result<(), QuestionnaireError> {
        let record = self.checked_record(upload_id, file_meta, handle)?;
        self.persistence.mutate(|store| store.upsert_upload(record));
        Ok(())
    }

    /// Mark a pending or failed upload as completed.
    ///
    /// # Errors
    ///
    /// Returns `QuestionnaireError::UploadNotRegistered` if no file was
    /// registered for the slot.
    pub fn complete_upload(&self, upload_id: &UploadId) -> Result<(), QuestionnaireError> {
        self.update_upload(upload_id, UploadRecord::mark_completed)
    }

    /// Mark an upload as failed with a message for the user.
    ///
    /// # Errors
    ///
    /// Returns `QuestionnaireError::UploadNotRegistered` if no file was
    /// registered for the slot.
    pub fn fail_upload(
        &self,
        upload_id: &UploadId,
        error: impl Into<String>,
    ) -> Result<(), QuestionnaireError> {
        let error = error.into();
        self.update_upload(upload_id, |record| record.mark_failed(error))
    }

    /// Remove an upload record. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `QuestionnaireError::Catalog` for unknown slots.
    pub fn remove_upload(&self, upload_id: &UploadId) -> Result<bool, QuestionnaireError> {
        self.catalog.upload_slot(upload_id)?;
        let removed = self
            .persistence
            .mutate(|store| store.remove_upload(upload_id));
        Ok(removed.is_some())
    }

    #[must_use]
    pub fn upload(&self, upload_id: &UploadId) -> Option<UploadRecord> {
        self.persistence
            .read(|store| store.upload(upload_id).cloned())
    }

    #[must_use]
    pub fn is_uploaded(&self, upload_id: &UploadId) -> bool {
        self.persistence.read(|store| store.is_uploaded(upload_id))
    }

    fn checked_record(
        &self,
        upload_id: &UploadId,
        file_meta: FileMeta,
        handle: Option<StorageHandle>,
    ) -> Result<UploadRecord, QuestionnaireError> {
        self.catalog.upload_slot(upload_id)?.check_file(&file_meta)?;
        let record = UploadRecord::pending(upload_id.clone(), file_meta);
        Ok(match handle {
            Some(handle) => record.with_storage_handle(handle),
            None => record,
        })
    }

    fn update_upload(
        &self,
        upload_id: &UploadId,
        apply: impl FnOnce(&mut UploadRecord),
    ) -> Result<(), QuestionnaireError> {
        let mut record = self
            .upload(upload_id)
            .ok_or_else(|| QuestionnaireError::UploadNotRegistered(upload_id.clone()))?;
        apply(&mut record);
        self.persistence.mutate(|store| store.upsert_upload(record));
        Ok(())
    }

    // ─── Progress ──────────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `QuestionnaireError::Catalog` for unknown KPIs.
    pub fn kpi_progress(&self, kpi_id: &KpiId) -> Result<KpiProgress, QuestionnaireError> {
        let kpi = self.catalog.kpi(kpi_id)?;
        Ok(self
            .persistence
            .read(|store| progress::kpi_progress(kpi, store)))
    }

    /// # Errors
    ///
    /// Returns `QuestionnaireError::Catalog` for unknown categories.
    pub fn category_progress(
        &self,
        category_id: &CategoryId,
    ) -> Result<CategoryProgress, QuestionnaireError> {
        let category = self.catalog.category(category_id)?;
        Ok(self
            .persistence
            .read(|store| progress::category_progress(category, store)))
    }

    /// Progress of every category, in catalog order.
    #[must_use]
    pub fn all_category_progress(&self) -> Vec<CategoryProgress> {
        self.persistence.read(|store| {
            self.catalog
                .categories()
                .iter()
                .map(|category| progress::category_progress(category, store))
                .collect()
        })
    }

    #[must_use]
    pub fn overall_progress(&self) -> OverallProgress {
        self.persistence
            .read(|store| progress::overall_progress(&self.catalog, store))
    }

    /// Required questions of `kpi_id` that are not yet complete.
    ///
    /// # Errors
    ///
    /// Returns `QuestionnaireError::Catalog` for unknown KPIs.
    pub fn missing_required(&self, kpi_id: &KpiId) -> Result<Vec<QuestionId>, QuestionnaireError> {
        let kpi = self.catalog.kpi(kpi_id)?;
        Ok(self.persistence.read(|store| {
            kpi.questions
                .iter()
                .filter(|q| q.required && !store.is_complete(&q.id))
                .map(|q| q.id.clone())
                .collect()
        }))
    }

    /// # Errors
    ///
    /// Returns `ValidationError::RequiredUnanswered` when a required question
    /// of the KPI is incomplete.
    pub fn validate_kpi(&self, kpi_id: &KpiId) -> Result<(), QuestionnaireError> {
        let missing = self.missing_required(kpi_id)?;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::RequiredUnanswered {
                kpi: kpi_id.clone(),
                questions: missing,
            }
            .into())
        }
    }

    // ─── Persistence ───────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `QuestionnaireError::Persistence` if the write fails.
    pub async fn save(&self) -> Result<SaveOutcome, QuestionnaireError> {
        Ok(self.persistence.save().await?)
    }

    /// Check required questions of `kpi_id`, save, and return the next KPI
    /// in catalog order (`None` after the last one).
    ///
    /// # Errors
    ///
    /// Returns `QuestionnaireError::Validation` without saving when required
    /// questions are missing, or `QuestionnaireError::Persistence` if the
    /// write fails.
    pub async fn save_and_next(&self, kpi_id: &KpiId) -> Result<Option<KpiId>, QuestionnaireError> {
        self.validate_kpi(kpi_id)?;
        self.persistence.save().await?;
        Ok(self.catalog.next_kpi(kpi_id)?.map(|kpi| kpi.id.clone()))
    }

    /// # Errors
    ///
    /// Returns `QuestionnaireError::Persistence` if the snapshot cannot be
    /// deleted.
    pub async fn clear_all(&self) -> Result<(), QuestionnaireError> {
        Ok(self.persistence.clear_all().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certify_core::model::{ProjectId, UploadStatus};
    use certify_core::rubric::builtin_catalog;
    use certify_core::time::{fixed_clock, fixed_now};
    use storage::repository::{InMemoryKeyValueStore, KeyValueStore};

    async fn service() -> QuestionnaireService {
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        let persistence = PersistenceManager::new(ProjectId::new("acme"), kv)
            .with_clock(fixed_clock())
            .open()
            .await
            .unwrap();
        QuestionnaireService::new(
            fixed_clock(),
            Arc::new(builtin_catalog().unwrap()),
            Arc::new(persistence),
        )
    }

    #[tokio::test]
    async fn answer_is_validated_and_stamped() {
        let svc = service().await;
        let q = QuestionId::new("energy-source");

        svc.answer(&q, "renewable").unwrap();
        let stored = svc.response(&q).unwrap();
        assert_eq!(stored.value, ResponseValue::Text("renewable".into()));
        assert_eq!(stored.answered_at, fixed_now());
        assert_eq!(svc.state(), SaveState::Dirty);

        let err = svc.answer(&q, "coal").unwrap_err();
        assert!(matches!(
            err,
            QuestionnaireError::Validation(ValidationError::UnknownOption { .. })
        ));
        assert_eq!(
            svc.response(&q).unwrap().value,
            ResponseValue::Text("renewable".into())
        );
    }

    #[tokio::test]
    async fn unknown_question_is_not_found() {
        let svc = service().await;
        let err = svc.answer(&QuestionId::new("nope"), true).unwrap_err();
        assert!(matches!(err, QuestionnaireError::Catalog(_)));
        assert_eq!(svc.state(), SaveState::Clean);
    }

    #[tokio::test]
    async fn rejected_upload_never_enters_store() {
        let svc = service().await;
        let slot = UploadId::new("waste-contract");
        let err = svc
            .attach_upload(&slot, FileMeta::from_file_name("contract.exe", 10), None)
            .unwrap_err();
        assert!(matches!(
            err,
            QuestionnaireError::Validation(ValidationError::ExtensionNotAllowed { .. })
        ));

        let too_big = FileMeta::from_file_name("contract.pdf", 5 * 1024 * 1024 + 1);
        assert!(svc.attach_upload(&slot, too_big, None).is_err());
        assert!(svc.upload(&slot).is_none());
        assert_eq!(svc.state(), SaveState::Clean);
    }

    #[tokio::test]
    async fn upload_lifecycle_pending_failed_completed() {
        let svc = service().await;
        let slot = UploadId::new("annual-report");
        let meta = FileMeta::from_file_name("report-2024.pdf", 1024);

        svc.begin_upload(&slot, meta, Some(StorageHandle::new("obj/123")))
            .unwrap();
        assert_eq!(svc.upload(&slot).unwrap().status, UploadStatus::Pending);
        assert!(!svc.is_uploaded(&slot));

        svc.fail_upload(&slot, "connection reset").unwrap();
        let failed = svc.upload(&slot).unwrap();
        assert_eq!(failed.status, UploadStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("connection reset"));

        svc.complete_upload(&slot).unwrap();
        let done = svc.upload(&slot).unwrap();
        assert!(svc.is_uploaded(&slot));
        assert_eq!(done.storage_handle, Some(StorageHandle::new("obj/123")));

        let missing = svc.complete_upload(&UploadId::new("safety-plan")).unwrap_err();
        assert!(matches!(missing, QuestionnaireError::UploadNotRegistered(_)));
    }

    #[tokio::test]
    async fn category_progress_tracks_answers_and_uploads() {
        let svc = service().await;
        let category = CategoryId::new("governance");

        svc.answer(&QuestionId::new("code-of-conduct"), false).unwrap();
        svc.answer(&QuestionId::new("whistleblower"), true).unwrap();
        let partial = svc.category_progress(&category).unwrap();
        // 2 of 6 items
        assert_eq!(partial.overall_progress_percent, 33);
        assert_eq!(partial.completed_kpis, 0);

        svc.attach_upload(
            &UploadId::new("code-document"),
            FileMeta::from_file_name("code.docx", 100),
            None,
        )
        .unwrap();
        let progress = svc.category_progress(&category).unwrap();
        assert_eq!(progress.overall_progress_percent, 50);
        assert_eq!(progress.completed_kpis, 1);
        assert_eq!(progress.earned_points, 15);

        assert!(matches!(
            svc.category_progress(&CategoryId::new("marketing")),
            Err(QuestionnaireError::Catalog(_))
        ));
    }

    #[tokio::test]
    async fn save_and_next_requires_answers() {
        let svc = service().await;
        let kpi = KpiId::new("env-energy");

        let err = svc.save_and_next(&kpi).await.unwrap_err();
        match err {
            QuestionnaireError::Validation(ValidationError::RequiredUnanswered {
                questions, ..
            }) => assert_eq!(
                questions,
                vec![QuestionId::new("energy-policy"), QuestionId::new("energy-source")]
            ),
            other => panic!("unexpected error: {other:?}"),
        }

        svc.answer(&QuestionId::new("energy-policy"), true).unwrap();
        svc.answer(&QuestionId::new("energy-source"), "grid").unwrap();
        let next = svc.save_and_next(&kpi).await.unwrap();
        assert_eq!(next, Some(KpiId::new("env-waste")));
        assert_eq!(svc.state(), SaveState::Clean);

        let last = svc.save_and_next(&KpiId::new("soc-community")).await.unwrap();
        assert_eq!(last, Some(KpiId::new("gov-ethics")));
        svc.answer(&QuestionId::new("reporting-frequency"), "annual")
            .unwrap();
        let end = svc.save_and_next(&KpiId::new("gov-reporting")).await.unwrap();
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn clear_all_resets_overall_progress() {
        let svc = service().await;
        svc.answer(&QuestionId::new("waste-sorting"), true).unwrap();
        svc.save().await.unwrap();
        assert!(svc.overall_progress().percent > 0);

        svc.clear_all().await.unwrap();
        assert_eq!(svc.overall_progress().percent, 0);
        assert_eq!(svc.overall_progress().completed_items, 0);
        assert_eq!(svc.state(), SaveState::Clean);
    }
}
