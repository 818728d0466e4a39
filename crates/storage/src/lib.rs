#![forbid(unsafe_code)]

pub mod repository;
pub mod snapshot;
pub mod sqlite;

pub use repository::{InMemoryKeyValueStore, KeyValueStore, Storage, StorageError};
pub use snapshot::{SnapshotRepository, snapshot_key};
