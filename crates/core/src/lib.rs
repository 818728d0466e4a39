#![forbid(unsafe_code)]

pub mod model;
pub mod progress;
pub mod rubric;
pub mod store;
pub mod time;

pub use progress::{CategoryProgress, CompletionLookup, KpiProgress, OverallProgress};
pub use store::ResponseStore;
pub use time::Clock;
