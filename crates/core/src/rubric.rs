//! Built-in certification rubric.
//!
//! Used when no catalog document is configured. Content only; all behavior
//! lives in [`crate::model::Catalog`].

use crate::model::{
    Catalog, CatalogError, Category, CategoryId, Kpi, KpiId, Question, QuestionId, QuestionKind,
    UploadId, UploadSlot,
};

/// Builds the default ESG certification rubric.
///
/// # Errors
///
/// Returns `CatalogError` only if the compiled content is inconsistent.
pub fn builtin_catalog() -> Result<Catalog, CatalogError> {
    Catalog::new(vec![environment(), social(), governance()])
}

fn environment() -> Category {
    Category {
        id: CategoryId::new("environment"),
        title: "Environment".into(),
        description: "Energy, emissions and resource use.".into(),
        kpis: vec![
            Kpi {
                id: KpiId::new("env-energy"),
                title: "Energy management".into(),
                max_points: 20,
                questions: vec![
                    yes_no("energy-policy", "Is there a written energy policy?", true),
                    single(
                        "energy-source",
                        "Primary electricity source",
                        &["grid", "mixed", "renewable"],
                        true,
                    ),
                    yes_no("energy-audit", "Was an energy audit done in the last 3 years?", false),
                ],
                uploads: vec![slot(
                    "energy-bills",
                    "Last 12 months of energy bills",
                    &["pdf", "xlsx", "csv"],
                    10,
                )],
            },
            Kpi {
                id: KpiId::new("env-waste"),
                title: "Waste and recycling".into(),
                max_points: 15,
                questions: vec![
                    yes_no("waste-sorting", "Is waste sorted at source?", true),
                    multi(
                        "waste-measures",
                        "Measures in place",
                        &["recycling", "composting", "reuse", "reduction-targets"],
                        true,
                    ),
                ],
                uploads: vec![slot("waste-contract", "Waste collection contract", &["pdf"], 5)],
            },
            Kpi {
                id: KpiId::new("env-emissions"),
                title: "Emissions tracking".into(),
                max_points: 25,
                questions: vec![
                    single(
                        "emissions-scope",
                        "Highest emissions scope measured",
                        &["none", "scope-1", "scope-2", "scope-3"],
                        true,
                    ),
                    yes_no("emissions-targets", "Are reduction targets published?", true),
                ],
                uploads: vec![slot(
                    "emissions-report",
                    "Greenhouse gas inventory",
                    &["pdf", "xlsx"],
                    20,
                )],
            },
        ],
    }
}

fn social() -> Category {
    Category {
        id: CategoryId::new("social"),
        title: "Social".into(),
        description: "Workforce and community.".into(),
        kpis: vec![
            Kpi {
                id: KpiId::new("soc-workplace"),
                title: "Health and safety".into(),
                max_points: 20,
                questions: vec![
                    single(
                        "safety-training",
                        "Safety training frequency",
                        &["none", "annual", "quarterly"],
                        true,
                    ),
                    yes_no("employee-survey", "Is an employee survey run every year?", true),
                ],
                uploads: vec![slot("safety-plan", "Health and safety plan", &["pdf", "docx"], 10)],
            },
            Kpi {
                id: KpiId::new("soc-community"),
                title: "Community engagement".into(),
                max_points: 10,
                questions: vec![multi(
                    "community-programs",
                    "Active community programs",
                    &["volunteering", "donations", "local-sourcing", "education"],
                    false,
                )],
                uploads: Vec::new(),
            },
        ],
    }
}

fn governance() -> Category {
    Category {
        id: CategoryId::new("governance"),
        title: "Governance".into(),
        description: "Ethics, oversight and reporting.".into(),
        kpis: vec![
            Kpi {
                id: KpiId::new("gov-ethics"),
                title: "Business ethics".into(),
                max_points: 15,
                questions: vec![
                    yes_no("code-of-conduct", "Is there a signed code of conduct?", true),
                    yes_no("whistleblower", "Is there a whistleblower channel?", true),
                ],
                uploads: vec![slot("code-document", "Code of conduct", &["pdf", "docx"], 5)],
            },
            Kpi {
                id: KpiId::new("gov-reporting"),
                title: "Sustainability reporting".into(),
                max_points: 20,
                questions: vec![
                    single(
                        "reporting-frequency",
                        "Reporting frequency",
                        &["none", "annual", "semiannual"],
                        true,
                    ),
                    multi(
                        "reporting-standards",
                        "Frameworks followed",
                        &["gri", "sasb", "tcfd", "csrd"],
                        false,
                    ),
                ],
                uploads: vec![slot("annual-report", "Latest sustainability report", &["pdf"], 25)],
            },
        ],
    }
}

fn yes_no(id: &str, label: &str, required: bool) -> Question {
    Question {
        id: QuestionId::new(id),
        label: label.into(),
        kind: QuestionKind::Boolean,
        options: Vec::new(),
        required,
    }
}

fn single(id: &str, label: &str, options: &[&str], required: bool) -> Question {
    Question {
        id: QuestionId::new(id),
        label: label.into(),
        kind: QuestionKind::SingleChoice,
        options: options.iter().map(|opt| (*opt).to_owned()).collect(),
        required,
    }
}

fn multi(id: &str, label: &str, options: &[&str], required: bool) -> Question {
    Question {
        kind: QuestionKind::MultiSelect,
        ..single(id, label, options, required)
    }
}

fn slot(id: &str, label: &str, extensions: &[&str], max_size_mb: u32) -> UploadSlot {
    UploadSlot {
        id: UploadId::new(id),
        label: label.into(),
        allowed_extensions: extensions.iter().map(|ext| (*ext).to_owned()).collect(),
        max_size_mb,
    }
}
