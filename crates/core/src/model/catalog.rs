use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CategoryId, KpiId, QuestionId, UploadId};
use crate::model::response::ResponseValue;
use crate::model::upload::{FileMeta, normalize_extension};
use crate::model::validation::ValidationError;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("category not found: {0}")]
    CategoryNotFound(CategoryId),

    #[error("KPI not found: {0}")]
    KpiNotFound(KpiId),

    #[error("question not found: {0}")]
    QuestionNotFound(QuestionId),

    #[error("upload slot not found: {0}")]
    UploadSlotNotFound(UploadId),

    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("choice question {0} has no options")]
    MissingOptions(QuestionId),

    #[error("upload slot {0} needs at least one extension and a positive size limit")]
    InvalidUploadSlot(UploadId),

    #[error("total points of the catalog exceed {}", u32::MAX)]
    PointsOverflow,

    #[error("invalid catalog document: {0}")]
    Parse(String),
}

//
// ─── RUBRIC NODES ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    SingleChoice,
    Boolean,
    MultiSelect,
}

impl QuestionKind {
    #[must_use]
    pub fn has_options(self) -> bool {
        matches!(self, Self::SingleChoice | Self::MultiSelect)
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SingleChoice => "single-choice",
            Self::Boolean => "boolean",
            Self::MultiSelect => "multi-select",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

impl Question {
    /// Checks that `value` has the right shape for this question.
    ///
    /// Cleared values (empty string, empty list, null) are accepted for every
    /// kind; they simply leave the question incomplete.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when the value type does not match the
    /// question kind or references options the question does not offer.
    pub fn check_value(&self, value: &ResponseValue) -> Result<(), ValidationError> {
        if !value.is_answered() {
            return Ok(());
        }
        match (self.kind, value) {
            (QuestionKind::Boolean, ResponseValue::Flag(_)) => Ok(()),
            (QuestionKind::SingleChoice, ResponseValue::Text(choice)) => self.check_option(choice),
            (QuestionKind::MultiSelect, ResponseValue::Choices(choices)) => {
                let mut seen = HashSet::with_capacity(choices.len());
                for choice in choices {
                    self.check_option(choice)?;
                    if !seen.insert(choice.as_str()) {
                        return Err(ValidationError::DuplicateOption {
                            question: self.id.clone(),
                            option: choice.clone(),
                        });
                    }
                }
                Ok(())
            }
            _ => Err(ValidationError::WrongAnswerType {
                question: self.id.clone(),
                expected: self.kind,
            }),
        }
    }

    fn check_option(&self, choice: &str) -> Result<(), ValidationError> {
        if self.options.iter().any(|opt| opt == choice) {
            Ok(())
        } else {
            Err(ValidationError::UnknownOption {
                question: self.id.clone(),
                option: choice.to_owned(),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSlot {
    pub id: UploadId,
    pub label: String,
    pub allowed_extensions: Vec<String>,
    #[serde(rename = "maxSizeMB")]
    pub max_size_mb: u32,
}

impl UploadSlot {
    #[must_use]
    pub fn max_size_bytes(&self) -> u64 {
        u64::from(self.max_size_mb) * 1024 * 1024
    }

    #[must_use]
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let wanted = normalize_extension(extension);
        self.allowed_extensions
            .iter()
            .any(|allowed| normalize_extension(allowed) == wanted)
    }

    /// Checks a file against the slot's extension list and size limit.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the name is blank, the extension is not
    /// allowed, or the file exceeds `max_size_mb`.
    pub fn check_file(&self, meta: &FileMeta) -> Result<(), ValidationError> {
        if meta.name.trim().is_empty() {
            return Err(ValidationError::EmptyFileName);
        }
        if !self.accepts_extension(&meta.extension) {
            return Err(ValidationError::ExtensionNotAllowed {
                upload: self.id.clone(),
                extension: meta.normalized_extension(),
                allowed: self.allowed_extensions.clone(),
            });
        }
        let max_bytes = self.max_size_bytes();
        if meta.size_bytes > max_bytes {
            return Err(ValidationError::FileTooLarge {
                upload: self.id.clone(),
                size_bytes: meta.size_bytes,
                max_bytes,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpi {
    pub id: KpiId,
    pub title: String,
    pub max_points: u32,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub uploads: Vec<UploadSlot>,
}

impl Kpi {
    /// Number of trackable items (questions plus upload slots).
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.questions.len() + self.uploads.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kpis: Vec<Kpi>,
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy)]
struct KpiPos {
    category: usize,
    kpi: usize,
}

/// Immutable category → KPI → (questions, upload slots) tree.
///
/// Built once and shared read-only; all lookups go through id indexes
/// created at construction time.
#[derive(Debug, Clone)]
pub struct Catalog {
    categories: Vec<Category>,
    categories_by_id: HashMap<CategoryId, usize>,
    kpis_by_id: HashMap<KpiId, KpiPos>,
    question_owner: HashMap<QuestionId, (KpiPos, usize)>,
    upload_owner: HashMap<UploadId, (KpiPos, usize)>,
    kpi_order: Vec<KpiPos>,
}

#[derive(Deserialize)]
struct CatalogDocument {
    categories: Vec<Category>,
}

impl Catalog {
    /// Validates and indexes the rubric tree.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for duplicate ids, choice questions without
    /// options, upload slots without extensions or size limit, or point
    /// values whose total does not fit in `u32`.
    pub fn new(categories: Vec<Category>) -> Result<Self, CatalogError> {
        let mut total_points: u32 = 0;
        let mut categories_by_id = HashMap::new();
        let mut kpis_by_id = HashMap::new();
        let mut question_owner = HashMap::new();
        let mut upload_owner = HashMap::new();
        let mut kpi_order = Vec::new();

        for (ci, category) in categories.iter().enumerate() {
            if categories_by_id.insert(category.id.clone(), ci).is_some() {
                return Err(duplicate("category", category.id.as_str()));
            }
            for (ki, kpi) in category.kpis.iter().enumerate() {
                let pos = KpiPos {
                    category: ci,
                    kpi: ki,
                };
                if kpis_by_id.insert(kpi.id.clone(), pos).is_some() {
                    return Err(duplicate("KPI", kpi.id.as_str()));
                }
                total_points = total_points
                    .checked_add(kpi.max_points)
                    .ok_or(CatalogError::PointsOverflow)?;
                kpi_order.push(pos);

                for (qi, question) in kpi.questions.iter().enumerate() {
                    if question.kind.has_options() && question.options.is_empty() {
                        return Err(CatalogError::MissingOptions(question.id.clone()));
                    }
                    if question_owner
                        .insert(question.id.clone(), (pos, qi))
                        .is_some()
                    {
                        return Err(duplicate("question", question.id.as_str()));
                    }
                }
                for (ui, slot) in kpi.uploads.iter().enumerate() {
                    if slot.allowed_extensions.is_empty() || slot.max_size_mb == 0 {
                        return Err(CatalogError::InvalidUploadSlot(slot.id.clone()));
                    }
                    if upload_owner.insert(slot.id.clone(), (pos, ui)).is_some() {
                        return Err(duplicate("upload slot", slot.id.as_str()));
                    }
                }
            }
        }

        Ok(Self {
            categories,
            categories_by_id,
            kpis_by_id,
            question_owner,
            upload_owner,
            kpi_order,
        })
    }

    /// Parses a catalog from JSON.
    ///
    /// Accepts either a bare array of categories or `{ "categories": [...] }`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` for malformed JSON, or any validation
    /// error from [`Catalog::new`].
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let parse_err = |e: serde_json::Error| CatalogError::Parse(e.to_string());
        let value: serde_json::Value = serde_json::from_str(raw).map_err(parse_err)?;
        let categories = if value.is_array() {
            serde_json::from_value::<Vec<Category>>(value).map_err(parse_err)?
        } else {
            serde_json::from_value::<CatalogDocument>(value)
                .map_err(parse_err)?
                .categories
        };
        Self::new(categories)
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Looks up a category by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::CategoryNotFound` for unknown ids.
    pub fn category(&self, id: &CategoryId) -> Result<&Category, CatalogError> {
        self.categories_by_id
            .get(id)
            .map(|&idx| &self.categories[idx])
            .ok_or_else(|| CatalogError::CategoryNotFound(id.clone()))
    }

    /// Looks up a KPI by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::KpiNotFound` for unknown ids.
    pub fn kpi(&self, id: &KpiId) -> Result<&Kpi, CatalogError> {
        self.kpis_by_id
            .get(id)
            .map(|&pos| self.kpi_at(pos))
            .ok_or_else(|| CatalogError::KpiNotFound(id.clone()))
    }

    /// Looks up a question by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::QuestionNotFound` for unknown ids.
    pub fn question(&self, id: &QuestionId) -> Result<&Question, CatalogError> {
        self.question_owner
            .get(id)
            .map(|&(pos, qi)| &self.kpi_at(pos).questions[qi])
            .ok_or_else(|| CatalogError::QuestionNotFound(id.clone()))
    }

    /// Looks up an upload slot by id.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UploadSlotNotFound` for unknown ids.
    pub fn upload_slot(&self, id: &UploadId) -> Result<&UploadSlot, CatalogError> {
        self.upload_owner
            .get(id)
            .map(|&(pos, ui)| &self.kpi_at(pos).uploads[ui])
            .ok_or_else(|| CatalogError::UploadSlotNotFound(id.clone()))
    }

    /// KPI that owns the given question.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::QuestionNotFound` for unknown ids.
    pub fn kpi_for_question(&self, id: &QuestionId) -> Result<&Kpi, CatalogError> {
        self.question_owner
            .get(id)
            .map(|&(pos, _)| self.kpi_at(pos))
            .ok_or_else(|| CatalogError::QuestionNotFound(id.clone()))
    }

    /// Category that owns the given KPI.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::KpiNotFound` for unknown ids.
    pub fn category_for_kpi(&self, id: &KpiId) -> Result<&Category, CatalogError> {
        self.kpis_by_id
            .get(id)
            .map(|pos| &self.categories[pos.category])
            .ok_or_else(|| CatalogError::KpiNotFound(id.clone()))
    }

    /// All KPIs in catalog order.
    pub fn kpis(&self) -> impl Iterator<Item = &Kpi> + '_ {
        self.kpi_order.iter().map(|&pos| self.kpi_at(pos))
    }

    /// The KPI after `id` in catalog order, crossing category boundaries.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::KpiNotFound` for unknown ids.
    pub fn next_kpi(&self, id: &KpiId) -> Result<Option<&Kpi>, CatalogError> {
        let pos = self
            .kpi_order
            .iter()
            .position(|&p| self.kpi_at(p).id == *id)
            .ok_or_else(|| CatalogError::KpiNotFound(id.clone()))?;
        Ok(self.kpi_order.get(pos + 1).map(|&p| self.kpi_at(p)))
    }

    #[must_use]
    pub fn total_items(&self) -> usize {
        self.kpis().map(Kpi::total_items).sum()
    }

    /// Sum of `max_points`; construction guarantees it fits in `u32`.
    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.kpis()
            .fold(0, |total, kpi| total.saturating_add(kpi.max_points))
    }

    fn kpi_at(&self, pos: KpiPos) -> &Kpi {
        &self.categories[pos.category].kpis[pos.kpi]
    }
}

fn duplicate(kind: &'static str, id: &str) -> CatalogError {
    CatalogError::DuplicateId {
        kind,
        id: id.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(id: &str, options: &[&str]) -> Question {
        Question {
            id: QuestionId::new(id),
            label: id.to_uppercase(),
            kind: QuestionKind::SingleChoice,
            options: options.iter().map(|o| (*o).to_owned()).collect(),
            required: true,
        }
    }

    fn multi(id: &str, options: &[&str]) -> Question {
        Question {
            kind: QuestionKind::MultiSelect,
            required: false,
            ..choice(id, options)
        }
    }

    fn flag(id: &str) -> Question {
        Question {
            id: QuestionId::new(id),
            label: id.to_uppercase(),
            kind: QuestionKind::Boolean,
            options: Vec::new(),
            required: true,
        }
    }

    fn slot(id: &str) -> UploadSlot {
        UploadSlot {
            id: UploadId::new(id),
            label: id.to_uppercase(),
            allowed_extensions: vec!["pdf".into(), ".DOCX".into()],
            max_size_mb: 2,
        }
    }

    fn sample() -> Vec<Category> {
        vec![
            Category {
                id: CategoryId::new("env"),
                title: "Environment".into(),
                description: String::new(),
                kpis: vec![
                    Kpi {
                        id: KpiId::new("k1"),
                        title: "Energy".into(),
                        max_points: 10,
                        questions: vec![flag("q1"), choice("q2", &["a", "b"])],
                        uploads: vec![slot("u1")],
                    },
                    Kpi {
                        id: KpiId::new("k2"),
                        title: "Waste".into(),
                        max_points: 5,
                        questions: vec![multi("q3", &["x", "y", "z"])],
                        uploads: Vec::new(),
                    },
                ],
            },
            Category {
                id: CategoryId::new("gov"),
                title: "Governance".into(),
                description: String::new(),
                kpis: vec![Kpi {
                    id: KpiId::new("k3"),
                    title: "Ethics".into(),
                    max_points: 7,
                    questions: Vec::new(),
                    uploads: vec![slot("u2")],
                }],
            },
        ]
    }

    #[test]
    fn unknown_category_is_not_found() {
        let catalog = Catalog::new(sample()).unwrap();
        let err = catalog.category(&CategoryId::new("social")).unwrap_err();
        assert_eq!(err, CatalogError::CategoryNotFound(CategoryId::new("social")));
    }

    #[test]
    fn lookups_resolve_nested_nodes() {
        let catalog = Catalog::new(sample()).unwrap();
        assert_eq!(catalog.kpi(&KpiId::new("k3")).unwrap().max_points, 7);
        assert_eq!(
            catalog.question(&QuestionId::new("q2")).unwrap().kind,
            QuestionKind::SingleChoice
        );
        assert_eq!(
            catalog.kpi_for_question(&QuestionId::new("q3")).unwrap().id,
            KpiId::new("k2")
        );
        assert_eq!(
            catalog.category_for_kpi(&KpiId::new("k3")).unwrap().id,
            CategoryId::new("gov")
        );
        assert_eq!(catalog.upload_slot(&UploadId::new("u2")).unwrap().max_size_mb, 2);
        assert_eq!(catalog.total_items(), 5);
        assert_eq!(catalog.total_points(), 22);
    }

    #[test]
    fn next_kpi_crosses_categories() {
        let catalog = Catalog::new(sample()).unwrap();
        let next = catalog.next_kpi(&KpiId::new("k2")).unwrap();
        assert_eq!(next.map(|k| k.id.as_str()), Some("k3"));
        assert!(catalog.next_kpi(&KpiId::new("k3")).unwrap().is_none());
        assert!(catalog.next_kpi(&KpiId::new("nope")).is_err());
    }

    #[test]
    fn duplicate_question_ids_are_rejected() {
        let mut categories = sample();
        categories[1].kpis[0].questions.push(flag("q1"));
        let err = Catalog::new(categories).unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateId {
                kind: "question",
                id: "q1".into()
            }
        );
    }

    #[test]
    fn overflowing_point_totals_are_rejected() {
        let mut categories = sample();
        categories[0].kpis[0].max_points = u32::MAX;
        assert_eq!(
            Catalog::new(categories).unwrap_err(),
            CatalogError::PointsOverflow
        );

        let raw = r#"[{ "id": "c", "title": "C", "kpis": [
            { "id": "a", "title": "A", "maxPoints": 4294967295 },
            { "id": "b", "title": "B", "maxPoints": 1 }
        ] }]"#;
        assert_eq!(
            Catalog::from_json(raw).unwrap_err(),
            CatalogError::PointsOverflow
        );
    }

    #[test]
    fn choice_questions_need_options() {
        let mut categories = sample();
        categories[0].kpis[0].questions.push(choice("q9", &[]));
        assert_eq!(
            Catalog::new(categories).unwrap_err(),
            CatalogError::MissingOptions(QuestionId::new("q9"))
        );
    }

    #[test]
    fn check_value_enforces_kind_and_options() {
        let q = choice("q2", &["a", "b"]);
        assert!(q.check_value(&ResponseValue::Text("a".into())).is_ok());
        assert!(q.check_value(&ResponseValue::Text(String::new())).is_ok());
        assert!(matches!(
            q.check_value(&ResponseValue::Text("c".into())),
            Err(ValidationError::UnknownOption { .. })
        ));
        assert!(matches!(
            q.check_value(&ResponseValue::Flag(true)),
            Err(ValidationError::WrongAnswerType { .. })
        ));

        let m = multi("q3", &["x", "y"]);
        assert!(
            m.check_value(&ResponseValue::Choices(vec!["x".into(), "y".into()]))
                .is_ok()
        );
        assert!(matches!(
            m.check_value(&ResponseValue::Choices(vec!["x".into(), "x".into()])),
            Err(ValidationError::DuplicateOption { .. })
        ));

        assert!(flag("q1").check_value(&ResponseValue::Flag(false)).is_ok());
        assert!(flag("q1").check_value(&ResponseValue::Empty).is_ok());
    }

    #[test]
    fn upload_slot_checks_extension_and_size() {
        let s = slot("u1");
        assert!(s.check_file(&FileMeta::from_file_name("plan.PDF", 1024)).is_ok());
        assert!(s.check_file(&FileMeta::from_file_name("plan.docx", 1024)).is_ok());
        assert!(matches!(
            s.check_file(&FileMeta::from_file_name("plan.exe", 1024)),
            Err(ValidationError::ExtensionNotAllowed { .. })
        ));
        assert!(
            s.check_file(&FileMeta::from_file_name("plan.pdf", 2 * 1024 * 1024))
                .is_ok()
        );
        assert!(matches!(
            s.check_file(&FileMeta::from_file_name("plan.pdf", 2 * 1024 * 1024 + 1)),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn from_json_accepts_wrapped_and_bare_documents() {
        let raw = r#"{
            "categories": [{
                "id": "env",
                "title": "Environment",
                "kpis": [{
                    "id": "k1",
                    "title": "Energy",
                    "maxPoints": 10,
                    "questions": [
                        { "id": "q1", "label": "Policy?", "type": "boolean", "required": true },
                        { "id": "q2", "label": "Source", "type": "single-choice", "options": ["grid", "solar"] }
                    ],
                    "uploads": [
                        { "id": "u1", "label": "Bills", "allowedExtensions": ["pdf"], "maxSizeMB": 5 }
                    ]
                }]
            }]
        }"#;
        let catalog = Catalog::from_json(raw).unwrap();
        assert_eq!(catalog.total_items(), 3);
        assert!(catalog.question(&QuestionId::new("q1")).unwrap().required);
        assert!(!catalog.question(&QuestionId::new("q2")).unwrap().required);

        let bare = r#"[{ "id": "empty", "title": "Empty" }]"#;
        let catalog = Catalog::from_json(bare).unwrap();
        assert_eq!(catalog.categories().len(), 1);
        assert_eq!(catalog.total_items(), 0);

        assert!(matches!(
            Catalog::from_json("{ not json"),
            Err(CatalogError::Parse(_))
        ));
    }
}
