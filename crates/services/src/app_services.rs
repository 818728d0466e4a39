use std::path::Path;
use std::sync::Arc;

use certify_core::model::{Catalog, ProjectId};
use certify_core::rubric::builtin_catalog;
use storage::repository::{KeyValueStore, Storage};
use tracing::info;

use crate::Clock;
use crate::error::AppServicesError;
use crate::persistence::{ConflictPolicy, PersistenceManager};
use crate::questionnaire::QuestionnaireService;

/// Assembles the questionnaire for one project on top of a storage backend.
#[derive(Clone)]
pub struct AppServices {
    project_id: ProjectId,
    questionnaire: Arc<QuestionnaireService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization, catalog loading
    /// or snapshot hydration fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        project_id: ProjectId,
        catalog_path: Option<&Path>,
        policy: ConflictPolicy,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let catalog = load_catalog(catalog_path)?;
        Self::assemble(Arc::clone(&storage.kv), clock, project_id, catalog, policy).await
    }

    /// Build services over an arbitrary key-value backend.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Persistence` if snapshot hydration fails.
    pub async fn assemble(
        kv: Arc<dyn KeyValueStore>,
        clock: Clock,
        project_id: ProjectId,
        catalog: Catalog,
        policy: ConflictPolicy,
    ) -> Result<Self, AppServicesError> {
        let persistence = PersistenceManager::new(project_id.clone(), kv)
            .with_clock(clock)
            .with_conflict_policy(policy)
            .open()
            .await?;
        let questionnaire = Arc::new(QuestionnaireService::new(
            clock,
            Arc::new(catalog),
            Arc::new(persistence),
        ));
        Ok(Self {
            project_id,
            questionnaire,
        })
    }

    #[must_use]
    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    #[must_use]
    pub fn questionnaire(&self) -> Arc<QuestionnaireService> {
        Arc::clone(&self.questionnaire)
    }
}

/// Read a JSON catalog from `path`, or fall back to the built-in rubric.
///
/// # Errors
///
/// Returns `AppServicesError` if the file cannot be read or the catalog is
/// invalid.
pub fn load_catalog(path: Option<&Path>) -> Result<Catalog, AppServicesError> {
    let Some(path) = path else {
        return Ok(builtin_catalog()?);
    };
    let raw = std::fs::read_to_string(path).map_err(|source| AppServicesError::CatalogFile {
        path: path.display().to_string(),
        source,
    })?;
    let catalog = Catalog::from_json(&raw)?;
    info!(path = %path.display(), categories = catalog.categories().len(), "loaded catalog");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use certify_core::model::QuestionId;
    use certify_core::time::fixed_clock;
    use storage::repository::InMemoryKeyValueStore;

    #[test]
    fn missing_path_uses_builtin_rubric() {
        let catalog = load_catalog(None).unwrap();
        assert_eq!(catalog.kpis().count(), 7);
    }

    #[test]
    fn unreadable_catalog_file_is_reported() {
        let err = load_catalog(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(matches!(err, AppServicesError::CatalogFile { .. }));
    }

    #[tokio::test]
    async fn assembled_services_share_one_store() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        let services = AppServices::assemble(
            kv,
            fixed_clock(),
            ProjectId::new("acme"),
            builtin_catalog().unwrap(),
            ConflictPolicy::default(),
        )
        .await
        .unwrap();

        services
            .questionnaire()
            .answer(&QuestionId::new("waste-sorting"), true)
            .unwrap();
        assert!(
            services
                .questionnaire()
                .is_complete(&QuestionId::new("waste-sorting"))
        );
        assert_eq!(services.project_id().as_str(), "acme");
    }
}
