//! Batched key scans.

use crate::database::Database;
use crate::error::CoreResult;
use crate::strided::Strided;
use crate::transaction::Transaction;
use crate::types::{CollectionId, Key, Options, KEY_UNKNOWN};

/// One `(collection, start_key, limit)` request per task.
#[derive(Debug, Clone, Copy)]
pub struct ScanArgs<'a> {
    /// Collection per task; absent means the main collection.
    pub collections: Strided<'a, CollectionId>,
    /// First key of interest; [`KEY_UNKNOWN`] means from the beginning.
    pub start_keys: Strided<'a, Key>,
    /// Maximum keys returned per task; absent means unbounded.
    pub limits: Strided<'a, u32>,
    /// Number of tasks.
    pub count: usize,
}

impl<'a> ScanArgs<'a> {
    /// A single-task scan.
    #[must_use]
    pub fn one(collection: &'a CollectionId, start_key: &'a Key, limit: &'a u32) -> Self {
        Self {
            collections: Strided::broadcast(collection),
            start_keys: Strided::broadcast(start_key),
            limits: Strided::broadcast(limit),
            count: 1,
        }
    }
}

/// Columnar scan result: per-task counts and a joined key column.
#[derive(Debug)]
pub struct ScanOutput {
    /// Number of keys returned per task.
    pub counts: Vec<u32>,
    /// Start of each task's keys inside `keys`.
    pub offsets: Vec<u32>,
    /// Joined keys of all tasks.
    pub keys: Vec<Key>,
}

impl ScanOutput {
    /// Returns the keys of task `i`.
    #[must_use]
    pub fn task_keys(&self, i: usize) -> &[Key] {
        let start = self.offsets[i] as usize;
        &self.keys[start..start + self.counts[i] as usize]
    }
}

/// Scans each task's collection for up to `limit` keys `>= start_key`,
/// returned in ascending order so callers can paginate with
/// `last_key + 1`. Under a transaction the staged write-set is
/// overlaid: staged inserts appear, staged erases disappear.
pub fn scan(
    db: &Database,
    txn: Option<&Transaction>,
    args: &ScanArgs<'_>,
    options: Options,
) -> CoreResult<ScanOutput> {
    let state = db.state().read();
    let mut out = ScanOutput {
        counts: Vec::with_capacity(args.count),
        offsets: Vec::with_capacity(args.count),
        keys: Vec::new(),
    };

    for i in 0..args.count {
        let slot = if options.contains(Options::COLOCATED) { 0 } else { i };
        let collection_id = args
            .collections
            .get(slot)
            .copied()
            .unwrap_or(CollectionId::MAIN);
        let collection = state.collection(collection_id)?;
        let start = args.start_keys.get(i).copied().unwrap_or(KEY_UNKNOWN);
        let limit = args.limits.get(i).copied().unwrap_or(u32::MAX);

        let mut found: Vec<Key> = collection
            .keys()
            .copied()
            .filter(|key| *key >= start)
            .collect();

        if let Some(txn) = txn {
            let mut erased: Vec<Key> = Vec::new();
            for (&(staged_collection, key), value) in txn.staged_entries() {
                if staged_collection != collection_id || key < start {
                    continue;
                }
                match value {
                    Some(_) => found.push(key),
                    None => erased.push(key),
                }
            }
            if !erased.is_empty() {
                found.retain(|key| !erased.contains(key));
            }
        }

        found.sort_unstable();
        found.dedup();
        found.truncate(limit as usize);

        out.counts.push(found.len() as u32);
        out.offsets.push(out.keys.len() as u32);
        out.keys.extend(found);
    }
    Ok(out)
}
