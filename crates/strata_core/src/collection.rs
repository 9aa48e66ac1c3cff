//! Collections of versioned values.

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::types::{Key, SequenceNumber};

/// A value together with the sequence number of the mutation that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedValue {
    /// The stored bytes. Empty is a legal value, distinct from absent.
    pub data: Vec<u8>,
    /// Sequence of the write that produced this version.
    pub sequence: SequenceNumber,
}

/// An unordered mapping from integer key to versioned value.
#[derive(Debug, Default)]
pub struct Collection {
    name: String,
    pairs: HashMap<Key, SequencedValue>,
}

impl Collection {
    /// Creates an empty collection. The main collection carries an
    /// empty name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pairs: HashMap::new(),
        }
    }

    /// Returns the collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up the current version of `key`.
    #[must_use]
    pub fn lookup(&self, key: Key) -> Option<&SequencedValue> {
        self.pairs.get(&key)
    }

    /// Inserts or overwrites `key`, stamping the given sequence.
    /// Overwrites reuse the existing allocation where possible.
    pub fn upsert(&mut self, key: Key, data: Vec<u8>, sequence: SequenceNumber) {
        match self.pairs.get_mut(&key) {
            Some(entry) => {
                entry.sequence = sequence;
                entry.data = data;
            }
            None => {
                self.pairs.insert(key, SequencedValue { data, sequence });
            }
        }
    }

    /// Removes `key`. No tombstone is retained; the key simply
    /// disappears. Returns whether an entry was present.
    pub fn erase(&mut self, key: Key) -> bool {
        self.pairs.remove(&key).is_some()
    }

    /// Reserves room for `additional` entries, surfacing allocation
    /// failure as [`CoreError::Oom`].
    pub fn reserve_more(&mut self, additional: usize) -> CoreResult<()> {
        self.pairs.try_reserve(additional).map_err(|_| CoreError::Oom)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true when the collection holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterates over all entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &SequencedValue)> {
        self.pairs.iter()
    }

    /// Iterates over all keys in unspecified order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.pairs.keys()
    }
}
