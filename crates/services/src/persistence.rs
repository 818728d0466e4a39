use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use certify_core::model::{PersistedSnapshot, ProjectId};
use certify_core::{Clock, ResponseStore};
use storage::repository::KeyValueStore;
use storage::snapshot::SnapshotRepository;

use crate::error::PersistenceError;

/// Store state relative to durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    /// Durable snapshot matches the store.
    Clean,
    /// The store changed since the last successful save.
    Dirty,
    /// A write is in flight and nothing changed since it started.
    Saving,
}

/// What to do when the durable snapshot changed behind this session's back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Overwrite unconditionally; the last completed write wins.
    #[default]
    LastWriterWins,
    /// Re-read the snapshot before writing and refuse when its
    /// `lastSavedAt` differs from the one this session last loaded or wrote.
    RejectOnConflict,
}

/// Result of a successful `save()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A snapshot was written.
    Saved { saved_at: DateTime<Utc> },
    /// Nothing changed since the last successful save; no write happened.
    Unchanged,
}

#[derive(Debug)]
struct Session {
    store: ResponseStore,
    state: SaveState,
    last_saved_at: Option<DateTime<Utc>>,
    /// `lastSavedAt` of the snapshot believed to be durable.
    durable_stamp: Option<DateTime<Utc>>,
}

impl Session {
    fn empty() -> Self {
        Self {
            store: ResponseStore::new(),
            state: SaveState::Clean,
            last_saved_at: None,
            durable_stamp: None,
        }
    }
}

/// Owns one project's [`ResponseStore`] and snapshots it on demand.
///
/// Saving is explicit only: nothing here runs on a timer. Store mutations
/// are synchronous and may interleave with an in-flight `save()`; the
/// session lock is never held across an await point.
///
/// Durable writes and deletes run one at a time behind an async gate, so a
/// `save()` or `clear_all()` issued while a write is in flight waits for it
/// and then acts on the state that write left behind.
pub struct PersistenceManager {
    project_id: ProjectId,
    snapshots: SnapshotRepository,
    clock: Clock,
    policy: ConflictPolicy,
    session: Mutex<Session>,
    writes: tokio::sync::Mutex<()>,
}

impl PersistenceManager {
    /// Create a manager with an empty, clean store.
    ///
    /// Call [`PersistenceManager::open`] to hydrate from durable storage.
    #[must_use]
    pub fn new(project_id: ProjectId, kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            project_id,
            snapshots: SnapshotRepository::new(kv),
            clock: Clock::default(),
            policy: ConflictPolicy::default(),
            session: Mutex::new(Session::empty()),
            writes: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Load the project's snapshot, if any, and start Clean.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the snapshot cannot be read or decoded.
    pub async fn open(self) -> Result<Self, PersistenceError> {
        let snapshot = self.snapshots.load(&self.project_id).await?;
        {
            let mut session = self.lock();
            *session = Session::empty();
            if let Some(snapshot) = snapshot {
                session.store = ResponseStore::from_snapshot(&snapshot);
                session.last_saved_at = Some(snapshot.last_saved_at);
                session.durable_stamp = Some(snapshot.last_saved_at);
                info!(
                    project = %self.project_id,
                    responses = session.store.response_count(),
                    uploads = session.store.upload_count(),
                    "hydrated questionnaire from snapshot"
                );
            } else {
                info!(project = %self.project_id, "no snapshot found, starting empty");
            }
        }
        Ok(self)
    }

    #[must_use]
    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    #[must_use]
    pub fn state(&self) -> SaveState {
        self.lock().state
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state() == SaveState::Dirty
    }

    #[must_use]
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.lock().last_saved_at
    }

    /// Read the store without changing state.
    pub fn read<R>(&self, f: impl FnOnce(&ResponseStore) -> R) -> R {
        f(&self.lock().store)
    }

    /// Apply a mutation to the store.
    ///
    /// Any change to the store's revision moves the state to Dirty, including
    /// while a save is in flight.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut ResponseStore) -> R) -> R {
        let mut session = self.lock();
        let before = session.store.revision();
        let out = f(&mut session.store);
        if session.store.revision() != before && session.state != SaveState::Dirty {
            debug!(project = %self.project_id, from = ?session.state, "store marked dirty");
            session.state = SaveState::Dirty;
        }
        out
    }

    /// Write the current store to durable storage unless it is Clean.
    ///
    /// A call made while another write is in flight waits for it. If that
    /// write left the store Clean this returns `Unchanged`; otherwise it
    /// writes again and reports its own result. A mutation that lands while
    /// the write is in flight leaves the state Dirty once the write
    /// completes. On failure the state returns to Dirty and the error is
    /// handed back so the caller can retry.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the write fails or, under
    /// [`ConflictPolicy::RejectOnConflict`], the snapshot changed underneath.
    pub async fn save(&self) -> Result<SaveOutcome, PersistenceError> {
        if self.state() == SaveState::Clean {
            return Ok(SaveOutcome::Unchanged);
        }
        let _gate = self.writes.lock().await;

        let (snapshot, revision) = {
            let mut session = self.lock();
            if session.state == SaveState::Clean {
                return Ok(SaveOutcome::Unchanged);
            }
            session.state = SaveState::Saving;
            let snapshot = session
                .store
                .to_snapshot(self.project_id.clone(), self.clock.now());
            (snapshot, session.store.revision())
        };
        debug!(project = %self.project_id, revision, "save started");

        let result = self.write(&snapshot).await;

        let mut session = self.lock();
        match result {
            Ok(()) => {
                let saved_at = snapshot.last_saved_at;
                session.last_saved_at = Some(saved_at);
                session.durable_stamp = Some(saved_at);
                session.state = if session.store.revision() == revision {
                    SaveState::Clean
                } else {
                    SaveState::Dirty
                };
                info!(
                    project = %self.project_id,
                    responses = snapshot.responses.len(),
                    uploads = snapshot.uploads.len(),
                    state = ?session.state,
                    "questionnaire saved"
                );
                Ok(SaveOutcome::Saved { saved_at })
            }
            Err(err) => {
                session.state = SaveState::Dirty;
                warn!(project = %self.project_id, error = %err, "save failed");
                Err(err)
            }
        }
    }

    async fn write(&self, snapshot: &PersistedSnapshot) -> Result<(), PersistenceError> {
        if self.policy == ConflictPolicy::RejectOnConflict {
            let found = self
                .snapshots
                .load(&self.project_id)
                .await?
                .map(|s| s.last_saved_at);
            let expected = self.lock().durable_stamp;
            if found != expected {
                warn!(project = %self.project_id, ?expected, ?found, "snapshot changed underneath");
                return Err(PersistenceError::ConcurrentOverwrite { expected, found });
            }
        }
        self.snapshots.save(snapshot).await?;
        Ok(())
    }

    /// Delete the durable snapshot and empty the store.
    ///
    /// Waits for any in-flight write, so a snapshot captured before the
    /// clear never lands after it. The store is emptied even when the delete
    /// fails; in that case the state is Dirty so a later `save()` overwrites
    /// the stale snapshot.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the snapshot cannot be deleted.
    pub async fn clear_all(&self) -> Result<(), PersistenceError> {
        let _gate = self.writes.lock().await;
        let result = self.snapshots.delete(&self.project_id).await;

        let mut session = self.lock();
        session.store.clear();
        match result {
            Ok(()) => {
                session.state = SaveState::Clean;
                session.last_saved_at = None;
                session.durable_stamp = None;
                info!(project = %self.project_id, "questionnaire cleared");
                Ok(())
            }
            Err(err) => {
                session.state = SaveState::Dirty;
                warn!(project = %self.project_id, error = %err, "clear failed");
                Err(err.into())
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
