//! Prefix enumeration over path buckets.

use tracing::debug;

use strata_core::kernel::{self, ScanArgs};
use strata_core::{
    Arena, CollectionId, Contents, CoreError, CoreResult, Database, Key, Options, Places, Strided,
    Transaction, KEY_UNKNOWN,
};

use crate::bucket::Bucket;
use crate::hash::PathHasher;

/// Columnar result of a match batch: per-task counts over one joined,
/// offset-indexed column of path bytes.
#[derive(Debug)]
pub struct MatchOutput {
    /// Number of paths emitted per task.
    pub counts: Vec<u32>,
    /// Start of each emitted path inside `paths`, plus a trailing end
    /// offset.
    pub offsets: Vec<u32>,
    /// Joined path bytes of all tasks.
    pub paths: Vec<u8>,
}

impl MatchOutput {
    fn new(task_count: usize) -> Self {
        Self {
            counts: Vec::with_capacity(task_count),
            offsets: vec![0],
            paths: Vec::new(),
        }
    }

    fn push(&mut self, path: &[u8]) {
        self.paths.extend_from_slice(path);
        self.offsets.push(self.paths.len() as u32);
    }

    /// Total number of emitted paths across all tasks.
    #[must_use]
    pub fn total(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Returns emitted path `j` in batch order.
    #[must_use]
    pub fn path(&self, j: usize) -> &[u8] {
        &self.paths[self.offsets[j] as usize..self.offsets[j + 1] as usize]
    }

    /// Iterates the paths emitted for task `i`.
    pub fn task_paths(&self, i: usize) -> impl Iterator<Item = &[u8]> {
        let start: u32 = self.counts[..i].iter().sum();
        let end = start + self.counts[i];
        (start..end).map(move |j| self.path(j as usize))
    }
}

/// Enumerates stored paths starting with each task's prefix.
///
/// A task is `(collection, prefix, previous, limit)`. `previous` is the
/// resume cursor: the last path emitted by an earlier call, or absent
/// to start from the beginning. Enumeration scans the collection's
/// buckets in key order, so repeated calls that thread the cursor
/// through eventually emit every matching path exactly once — the
/// cursor skips the already-reported members of its own bucket, since
/// one bucket can hold several matches.
#[allow(clippy::too_many_arguments)]
pub fn paths_match(
    db: &Database,
    mut txn: Option<&mut Transaction>,
    hasher: &PathHasher,
    collections: Strided<'_, CollectionId>,
    prefixes: &Contents<'_>,
    previous: &Contents<'_>,
    limits: Strided<'_, u32>,
    options: Options,
    arena: &mut Arena,
) -> CoreResult<MatchOutput> {
    arena.begin_call(options);
    let mut out = MatchOutput::new(prefixes.count);

    for i in 0..prefixes.count {
        let collection = if options.contains(Options::COLOCATED) {
            collections.get(0)
        } else {
            collections.get(i)
        }
        .copied()
        .unwrap_or(CollectionId::MAIN);
        let prefix = prefixes.get(i)?.unwrap_or(b"");
        let cursor = previous.get(i)?;
        let limit = limits.get(i).copied().ok_or_else(|| {
            CoreError::invalid_argument("a scan limit is required for every task")
        })?;

        let emitted = match_one(
            db,
            txn.as_deref_mut(),
            hasher,
            collection,
            prefix,
            cursor,
            limit,
            options,
            arena,
            &mut out,
        )?;
        out.counts.push(emitted);
        debug!(task = i, emitted, "prefix match finished");
    }
    Ok(out)
}

/// One task's enumeration loop: scan a page of bucket keys, batch-read
/// the buckets, emit matching members, paginate from the last key.
#[allow(clippy::too_many_arguments)]
fn match_one(
    db: &Database,
    mut txn: Option<&mut Transaction>,
    hasher: &PathHasher,
    collection: CollectionId,
    prefix: &[u8],
    previous: Option<&[u8]>,
    limit: u32,
    options: Options,
    arena: &mut Arena,
    out: &mut MatchOutput,
) -> CoreResult<u32> {
    let mut emitted = 0u32;
    let mut reached_previous = previous.is_none();
    let mut next_key: Key = match previous {
        Some(path) => hasher.hash(path),
        None => KEY_UNKNOWN,
    };

    'pages: while emitted < limit {
        let scanned = kernel::scan(
            db,
            txn.as_deref(),
            &ScanArgs::one(&collection, &next_key, &limit),
            options,
        )?;
        let keys = scanned.task_keys(0).to_vec();
        if keys.is_empty() {
            break;
        }

        let places = Places::in_collection(&collection, &keys);
        let buckets = kernel::read(
            db,
            txn.as_deref_mut(),
            &places,
            options | Options::DONT_DISCARD_MEMORY,
            arena,
        )?;

        for j in 0..keys.len() {
            let Some(bytes) = buckets.value(arena, j) else {
                continue;
            };
            for entry in Bucket::parse(bytes)?.entries() {
                if !entry.path.starts_with(prefix) {
                    continue;
                }
                if let Some(previous) = previous {
                    if entry.path == previous {
                        // The boundary between old results and new ones.
                        reached_previous = true;
                        continue;
                    }
                }
                if !reached_previous {
                    continue;
                }
                if emitted >= limit {
                    break 'pages;
                }
                out.push(entry.path);
                emitted += 1;
            }
        }

        match keys.last() {
            Some(&last) if last < Key::MAX => next_key = last + 1,
            _ => break,
        }
    }
    Ok(emitted)
}
