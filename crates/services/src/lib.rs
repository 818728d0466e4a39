#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod persistence;
pub mod questionnaire;

pub use certify_core::Clock;

pub use app_services::{AppServices, load_catalog};
pub use error::{AppServicesError, PersistenceError, QuestionnaireError};
pub use persistence::{ConflictPolicy, PersistenceManager, SaveOutcome, SaveState};
pub use questionnaire::QuestionnaireService;
