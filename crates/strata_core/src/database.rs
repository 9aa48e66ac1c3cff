//! Database handle and collection management.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::collection::Collection;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::snapshot;
use crate::transaction::{self, Transaction};
use crate::types::{CollectionId, SequenceNumber};

/// Everything guarded by the database lock: the collection slot table
/// and the name map.
pub(crate) struct DbState {
    /// Slot 0 is the unnamed main collection. Removing a collection
    /// vacates its slot; slots are never reissued, so a stale handle
    /// resolves to an error instead of a different collection.
    pub(crate) slots: Vec<Option<Collection>>,
    pub(crate) names: HashMap<String, CollectionId>,
}

impl DbState {
    pub(crate) fn new() -> Self {
        Self {
            slots: vec![Some(Collection::new(""))],
            names: HashMap::new(),
        }
    }

    /// Resolves a collection handle. The caller must already hold the
    /// database lock in either mode.
    pub(crate) fn collection(&self, id: CollectionId) -> CoreResult<&Collection> {
        self.slots
            .get(id.as_u32() as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                CoreError::invalid_argument(format!("collection handle {id} is not live"))
            })
    }

    pub(crate) fn collection_mut(&mut self, id: CollectionId) -> CoreResult<&mut Collection> {
        self.slots
            .get_mut(id.as_u32() as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| {
                CoreError::invalid_argument(format!("collection handle {id} is not live"))
            })
    }

    fn upsert(&mut self, name: &str) -> CoreResult<CollectionId> {
        if name.is_empty() {
            return Err(CoreError::invalid_argument(
                "collection name must not be empty",
            ));
        }
        if let Some(&id) = self.names.get(name) {
            return Ok(id);
        }
        let id = CollectionId::new(
            u32::try_from(self.slots.len())
                .map_err(|_| CoreError::invalid_argument("collection slot table exhausted"))?,
        );
        self.slots.push(Some(Collection::new(name)));
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    fn remove(&mut self, name: &str) {
        if let Some(id) = self.names.remove(name) {
            self.slots[id.as_u32() as usize] = None;
        }
    }
}

/// A transactional, multi-collection key-value database.
///
/// All state lives in memory; an optional snapshot file restores the
/// database on open and persists it on close. The handle is meant to be
/// shared across threads behind an `Arc`: concurrency is controlled by
/// one database-wide reader-writer lock, and the global sequence
/// counter orders every mutation.
pub struct Database {
    state: RwLock<DbState>,
    /// Sequence of the most recent mutation. Loaded under a shared
    /// lock, bumped wherever a new sequence is drawn.
    youngest_seq: AtomicU64,
    config: Config,
    closed: AtomicBool,
}

impl Database {
    /// Opens a database from a config string: empty for in-memory,
    /// otherwise the snapshot path to restore from and persist to.
    pub fn open(config_str: &str) -> CoreResult<Self> {
        Self::with_config(Config::from_str(config_str))
    }

    /// Opens a database with an explicit configuration.
    pub fn with_config(config: Config) -> CoreResult<Self> {
        let (state, youngest) = match &config.snapshot_path {
            Some(path) if path.exists() => {
                let (state, youngest) = snapshot::load(path).map_err(|source| {
                    CoreError::open_failed(format!(
                        "restoring snapshot {}: {source}",
                        path.display()
                    ))
                })?;
                info!(path = %path.display(), youngest = %youngest, "restored snapshot");
                (state, youngest)
            }
            _ => (DbState::new(), SequenceNumber::new(0)),
        };

        Ok(Self {
            state: RwLock::new(state),
            youngest_seq: AtomicU64::new(youngest.as_u64()),
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// Opens a fresh in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(DbState::new()),
            youngest_seq: AtomicU64::new(0),
            config: Config::default(),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the configuration this database was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates the named collection, or returns the existing handle.
    pub fn collection_upsert(&self, name: &str) -> CoreResult<CollectionId> {
        let mut state = self.state.write();
        let known = state.names.contains_key(name);
        let id = state.upsert(name)?;
        if !known {
            debug!(name, %id, "created collection");
        }
        Ok(id)
    }

    /// Drops the named collection and all its entries. Removing an
    /// unknown name is a no-op.
    pub fn collection_remove(&self, name: &str) -> CoreResult<()> {
        if name.is_empty() {
            return Err(CoreError::invalid_argument(
                "the main collection cannot be removed",
            ));
        }
        let mut state = self.state.write();
        state.remove(name);
        debug!(name, "removed collection");
        Ok(())
    }

    /// Returns the handle of the named collection, if present.
    #[must_use]
    pub fn collection_lookup(&self, name: &str) -> Option<CollectionId> {
        self.state.read().names.get(name).copied()
    }

    /// Begins a transaction at the next sequence number.
    #[must_use]
    pub fn begin(&self) -> Transaction {
        Transaction::new(self.next_sequence())
    }

    /// Begins a transaction at an explicit sequence number. Zero means
    /// "draw the next one", like [`Database::begin`].
    #[must_use]
    pub fn begin_at(&self, seq: SequenceNumber) -> Transaction {
        if seq.as_u64() == 0 {
            self.begin()
        } else {
            Transaction::new(seq)
        }
    }

    /// Validates and applies a transaction. Consumes it either way:
    /// on error the staged writes are discarded.
    pub fn commit(&self, txn: Transaction) -> CoreResult<()> {
        transaction::commit(self, txn)
    }

    /// The sequence of the most recent mutation.
    #[must_use]
    pub fn youngest(&self) -> SequenceNumber {
        SequenceNumber::new(self.youngest_seq.load(Ordering::SeqCst))
    }

    /// Draws the next sequence number, wrapping at the 64-bit boundary.
    pub(crate) fn next_sequence(&self) -> SequenceNumber {
        SequenceNumber::new(
            self.youngest_seq
                .fetch_add(1, Ordering::SeqCst)
                .wrapping_add(1),
        )
    }

    /// Control requests are not implemented by the in-memory backend.
    pub fn control(&self, request: &str) -> CoreResult<String> {
        Err(CoreError::unsupported(format!("control request {request:?}")))
    }

    /// Flushes the snapshot (when configured) and marks the database
    /// closed. Idempotent; also invoked on drop.
    pub fn close(&self) -> CoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(path) = &self.config.snapshot_path {
            if self.config.snapshot_on_close {
                let state = self.state.read();
                snapshot::save(path, &state, self.youngest())?;
                info!(path = %path.display(), "persisted snapshot");
            }
        }
        Ok(())
    }

    pub(crate) fn state(&self) -> &RwLock<DbState> {
        &self.state
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("youngest", &self.youngest())
            .field("collections", &self.state.read().names.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_is_idempotent() {
        let db = Database::in_memory();
        let a = db.collection_upsert("col").unwrap();
        let b = db.collection_upsert("col").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, CollectionId::MAIN);
    }

    #[test]
    fn lookup_after_remove() {
        let db = Database::in_memory();
        db.collection_upsert("col").unwrap();
        assert!(db.collection_lookup("col").is_some());
        db.collection_remove("col").unwrap();
        assert!(db.collection_lookup("col").is_none());
    }

    #[test]
    fn removed_handles_are_not_reissued() {
        let db = Database::in_memory();
        let first = db.collection_upsert("col").unwrap();
        db.collection_remove("col").unwrap();
        let second = db.collection_upsert("col").unwrap();
        assert_ne!(first, second);

        let state = db.state().read();
        assert!(state.collection(first).is_err());
        assert!(state.collection(second).is_ok());
    }

    #[test]
    fn begin_draws_distinct_sequences() {
        let db = Database::in_memory();
        let t1 = db.begin();
        let t2 = db.begin();
        assert_ne!(t1.start_sequence(), t2.start_sequence());
        assert_eq!(db.youngest(), t2.start_sequence());
    }

    #[test]
    fn begin_at_zero_draws_fresh() {
        let db = Database::in_memory();
        let txn = db.begin_at(SequenceNumber::new(0));
        assert_eq!(txn.start_sequence(), SequenceNumber::new(1));
        let pinned = db.begin_at(SequenceNumber::new(42));
        assert_eq!(pinned.start_sequence(), SequenceNumber::new(42));
    }

    #[test]
    fn control_is_unsupported() {
        let db = Database::in_memory();
        assert!(matches!(
            db.control("compact"),
            Err(CoreError::Unsupported { .. })
        ));
    }
}
