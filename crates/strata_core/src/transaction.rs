//! Transactions: snapshot-isolated staging with optimistic commit.
//!
//! A transaction never touches the head until commit. Reads record the
//! sequence they observed into the read-set; writes stage bytes into
//! the write-set. Commit takes the exclusive lock, validates both sets
//! against the head, and applies the write-set atomically. Any failure
//! leaves the database unmodified.

use std::collections::HashMap;

use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::types::{CollectionId, Key, SequenceNumber};

/// Decides whether an entry was overwritten after a transaction began.
///
/// The sequence counter wraps at the 64-bit boundary, so the interval
/// check is circular: `youngest` may compare smaller than `start` when
/// the counter has wrapped between them. The exact comparison is part
/// of the engine contract and is exercised at the wrap boundary by the
/// tests below.
#[must_use]
pub fn overwritten_since(
    entry: SequenceNumber,
    start: SequenceNumber,
    youngest: SequenceNumber,
) -> bool {
    if start.as_u64() <= youngest.as_u64() {
        entry.as_u64() >= start.as_u64() && entry.as_u64() <= youngest.as_u64()
    } else {
        entry.as_u64() >= start.as_u64() || entry.as_u64() <= youngest.as_u64()
    }
}

/// An in-flight transaction.
///
/// Obtained from [`Database::begin`]. Dropping an uncommitted
/// transaction aborts it; aborted transactions leave no trace on the
/// database.
#[derive(Debug)]
pub struct Transaction {
    start_seq: SequenceNumber,
    /// Sequence observed for every head entry read by this transaction.
    read_set: HashMap<(CollectionId, Key), SequenceNumber>,
    /// Bytes staged for commit. `None` erases the key on commit.
    write_set: HashMap<(CollectionId, Key), Option<Vec<u8>>>,
}

impl Transaction {
    pub(crate) fn new(start_seq: SequenceNumber) -> Self {
        Self {
            start_seq,
            read_set: HashMap::new(),
            write_set: HashMap::new(),
        }
    }

    /// The sequence captured when this transaction began.
    #[must_use]
    pub fn start_sequence(&self) -> SequenceNumber {
        self.start_seq
    }

    /// Returns the staged write for `(collection, key)`, if any.
    /// `Some(None)` is a staged erase.
    #[must_use]
    pub fn staged(&self, collection: CollectionId, key: Key) -> Option<Option<&[u8]>> {
        self.write_set
            .get(&(collection, key))
            .map(|value| value.as_deref())
    }

    /// Returns the number of staged writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.write_set.len()
    }

    pub(crate) fn stage(&mut self, collection: CollectionId, key: Key, value: Option<Vec<u8>>) {
        self.write_set.insert((collection, key), value);
    }

    /// Iterates the staged writes in unspecified order.
    pub(crate) fn staged_entries(
        &self,
    ) -> impl Iterator<Item = (&(CollectionId, Key), &Option<Vec<u8>>)> {
        self.write_set.iter()
    }

    pub(crate) fn record_read(
        &mut self,
        collection: CollectionId,
        key: Key,
        observed: SequenceNumber,
    ) {
        self.read_set.insert((collection, key), observed);
    }
}

/// Commit protocol: validate under the exclusive lock, then apply.
pub(crate) fn commit(db: &Database, txn: Transaction) -> CoreResult<()> {
    let mut state = db.state().write();
    let youngest = db.youngest();

    // 1. Read-set validation. The read-set only holds entries that
    // existed at read time, so a missing head entry means it was erased
    // since.
    for (&(collection_id, key), &observed) in &txn.read_set {
        let collection = state.collection(collection_id)?;
        match collection.lookup(key) {
            Some(entry) if entry.sequence == observed => {}
            _ => return Err(CoreError::Stale),
        }
    }

    // 2. Write-set conflict check.
    for &(collection_id, key) in txn.write_set.keys() {
        if let Some(entry) = state.collection(collection_id)?.lookup(key) {
            if entry.sequence == txn.start_seq {
                return Err(CoreError::Reentrant);
            }
            if overwritten_since(entry.sequence, txn.start_seq, youngest) {
                return Err(CoreError::Conflict);
            }
        }
    }

    // 3. Capacity reservation, so the apply step cannot fail midway.
    let mut touched: HashMap<CollectionId, usize> = HashMap::new();
    for (&(collection_id, _), value) in &txn.write_set {
        if value.is_some() {
            *touched.entry(collection_id).or_default() += 1;
        }
    }
    for (&collection_id, &additional) in &touched {
        state.collection_mut(collection_id)?.reserve_more(additional)?;
    }

    // 4. Apply, stamping the whole commit with one fresh sequence.
    // Stamping with the begin-time sequence would let a commit appear
    // older than transactions that began after it and escape their
    // conflict checks.
    let stamp = db.next_sequence();
    for ((collection_id, key), value) in txn.write_set {
        let collection = state.collection_mut(collection_id)?;
        match value {
            Some(data) => collection.upsert(key, data, stamp),
            None => {
                collection.erase(key);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(n: u64) -> SequenceNumber {
        SequenceNumber::new(n)
    }

    #[test]
    fn overwritten_inside_plain_interval() {
        assert!(overwritten_since(seq(5), seq(4), seq(6)));
        assert!(overwritten_since(seq(4), seq(4), seq(6)));
        assert!(overwritten_since(seq(6), seq(4), seq(6)));
    }

    #[test]
    fn untouched_outside_plain_interval() {
        assert!(!overwritten_since(seq(3), seq(4), seq(6)));
        assert!(!overwritten_since(seq(7), seq(4), seq(6)));
    }

    #[test]
    fn wrapped_interval() {
        // The counter wrapped: start near u64::MAX, youngest restarted.
        let start = seq(u64::MAX - 1);
        let youngest = seq(2);
        assert!(overwritten_since(seq(u64::MAX), start, youngest));
        assert!(overwritten_since(seq(0), start, youngest));
        assert!(overwritten_since(seq(2), start, youngest));
        assert!(!overwritten_since(seq(3), start, youngest));
        assert!(!overwritten_since(seq(100), start, youngest));
    }

    #[test]
    fn staged_writes_shadow_each_other() {
        let mut txn = Transaction::new(seq(1));
        txn.stage(CollectionId::MAIN, 9, Some(b"first".to_vec()));
        txn.stage(CollectionId::MAIN, 9, Some(b"second".to_vec()));
        assert_eq!(txn.write_count(), 1);
        assert_eq!(txn.staged(CollectionId::MAIN, 9), Some(Some(&b"second"[..])));
    }

    #[test]
    fn staged_erase_is_observable() {
        let mut txn = Transaction::new(seq(1));
        txn.stage(CollectionId::MAIN, 9, None);
        assert_eq!(txn.staged(CollectionId::MAIN, 9), Some(None));
        assert_eq!(txn.staged(CollectionId::MAIN, 10), None);
    }
}
