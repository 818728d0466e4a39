//! Completion arithmetic over the rubric.
//!
//! Everything here is a pure fold of a [`CompletionLookup`] against the
//! [`Catalog`]; nothing is cached or stored.

use crate::model::{Catalog, Category, CategoryId, Kpi, KpiId, QuestionId, UploadId};

/// Answers "is this item done?" for the calculator.
pub trait CompletionLookup {
    fn is_question_complete(&self, question_id: &QuestionId) -> bool;
    fn is_upload_complete(&self, upload_id: &UploadId) -> bool;
}

/// Completion counts for one KPI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KpiProgress {
    pub kpi_id: KpiId,
    pub completed_questions: usize,
    pub total_questions: usize,
    pub completed_uploads: usize,
    pub total_uploads: usize,
    pub max_points: u32,
}

impl KpiProgress {
    /// A KPI is complete when every question and every upload is done.
    ///
    /// A KPI with no items is vacuously complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_questions == self.total_questions
            && self.completed_uploads == self.total_uploads
    }

    #[must_use]
    pub fn completed_items(&self) -> usize {
        self.completed_questions + self.completed_uploads
    }

    #[must_use]
    pub fn total_items(&self) -> usize {
        self.total_questions + self.total_uploads
    }

    #[must_use]
    pub fn percent(&self) -> u8 {
        percent(self.completed_items(), self.total_items())
    }

    /// Points credited provisionally: all or nothing per KPI.
    #[must_use]
    pub fn earned_points(&self) -> u32 {
        if self.is_complete() { self.max_points } else { 0 }
    }
}

/// Derived progress for one category. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryProgress {
    pub category_id: CategoryId,
    pub completed_kpis: usize,
    pub total_kpis: usize,
    pub completed_items: usize,
    pub total_items: usize,
    pub overall_progress_percent: u8,
    pub earned_points: u32,
    pub max_points: u32,
}

/// Item-weighted progress across the entire catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverallProgress {
    pub completed_kpis: usize,
    pub total_kpis: usize,
    pub completed_items: usize,
    pub total_items: usize,
    pub percent: u8,
    pub earned_points: u32,
    pub max_points: u32,
}

#[derive(Default)]
struct Tally {
    completed_kpis: usize,
    total_kpis: usize,
    completed_items: usize,
    total_items: usize,
    earned_points: u32,
    max_points: u32,
}

impl Tally {
    fn add(&mut self, kpi: &KpiProgress) {
        self.total_kpis += 1;
        if kpi.is_complete() {
            self.completed_kpis += 1;
        }
        self.completed_items += kpi.completed_items();
        self.total_items += kpi.total_items();
        self.earned_points = self.earned_points.saturating_add(kpi.earned_points());
        self.max_points = self.max_points.saturating_add(kpi.max_points);
    }
}

#[must_use]
pub fn kpi_progress<L>(kpi: &Kpi, lookup: &L) -> KpiProgress
where
    L: CompletionLookup + ?Sized,
{
    KpiProgress {
        kpi_id: kpi.id.clone(),
        completed_questions: kpi
            .questions
            .iter()
            .filter(|q| lookup.is_question_complete(&q.id))
            .count(),
        total_questions: kpi.questions.len(),
        completed_uploads: kpi
            .uploads
            .iter()
            .filter(|u| lookup.is_upload_complete(&u.id))
            .count(),
        total_uploads: kpi.uploads.len(),
        max_points: kpi.max_points,
    }
}

#[must_use]
pub fn category_progress<L>(category: &Category, lookup: &L) -> CategoryProgress
where
    L: CompletionLookup + ?Sized,
{
    let mut tally = Tally::default();
    for kpi in &category.kpis {
        tally.add(&kpi_progress(kpi, lookup));
    }
    CategoryProgress {
        category_id: category.id.clone(),
        completed_kpis: tally.completed_kpis,
        total_kpis: tally.total_kpis,
        completed_items: tally.completed_items,
        total_items: tally.total_items,
        overall_progress_percent: percent(tally.completed_items, tally.total_items),
        earned_points: tally.earned_points,
        max_points: tally.max_points,
    }
}

/// Straight item-weighted sum over every KPI; larger categories weigh more.
#[must_use]
pub fn overall_progress<L>(catalog: &Catalog, lookup: &L) -> OverallProgress
where
    L: CompletionLookup + ?Sized,
{
    let mut tally = Tally::default();
    for kpi in catalog.kpis() {
        tally.add(&kpi_progress(kpi, lookup));
    }
    OverallProgress {
        completed_kpis: tally.completed_kpis,
        total_kpis: tally.total_kpis,
        completed_items: tally.completed_items,
        total_items: tally.total_items,
        percent: percent(tally.completed_items, tally.total_items),
        earned_points: tally.earned_points,
        max_points: tally.max_points,
    }
}

/// Integer percentage, rounded half up and clamped to `0..=100`.
///
/// Returns 0 when `total` is 0.
#[must_use]
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u128;
    let total = total as u128;
    let rounded = (200 * completed + total) / (2 * total);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}
