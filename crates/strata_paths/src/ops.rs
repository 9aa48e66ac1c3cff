//! Batched path reads and writes.

use strata_core::kernel::{self, ReadOutput};
use strata_core::{
    Arena, Bitset, CollectionId, Contents, CoreError, CoreResult, Database, Key, Options, Places,
    Strided, Transaction, LEN_MISSING,
};

use crate::bucket::{self, Bucket};
use crate::hash::PathHasher;

fn required_path<'a>(paths: &Contents<'a>, i: usize) -> CoreResult<&'a [u8]> {
    paths
        .get(i)?
        .ok_or_else(|| CoreError::invalid_argument("a path is required for every task"))
}

fn resolve_collection(
    collections: &Strided<'_, CollectionId>,
    i: usize,
    options: Options,
) -> CollectionId {
    let slot = if options.contains(Options::COLOCATED) { 0 } else { i };
    collections.get(slot).copied().unwrap_or(CollectionId::MAIN)
}

/// Writes one `(path, value)` per task.
///
/// Paths are hashed to bucket keys; the unique buckets are fetched in
/// one batched read, rebuilt in memory, and stored in one batched
/// write. An absent *or empty* value removes the path — at this layer
/// the two are the same operation, and a bucket whose last entry goes
/// is erased from the store. Removing a path that was never written is
/// a no-op.
#[allow(clippy::too_many_arguments)]
pub fn paths_write(
    db: &Database,
    mut txn: Option<&mut Transaction>,
    hasher: &PathHasher,
    collections: Strided<'_, CollectionId>,
    paths: &Contents<'_>,
    values: &Contents<'_>,
    options: Options,
    arena: &mut Arena,
) -> CoreResult<()> {
    if values.count != paths.count {
        return Err(CoreError::invalid_argument(
            "value batch shape does not match the path count",
        ));
    }
    let count = paths.count;

    // Hash every task, then sort-and-dedup the bucket addresses so each
    // bucket is fetched and rebuilt exactly once per batch.
    let mut located: Vec<(CollectionId, Key)> = Vec::with_capacity(count);
    for i in 0..count {
        let path = required_path(paths, i)?;
        let collection = resolve_collection(&collections, i, options);
        located.push((collection, hasher.hash(path)));
    }
    let mut unique = located.clone();
    unique.sort_unstable();
    unique.dedup();

    let (bucket_collections, bucket_keys): (Vec<CollectionId>, Vec<Key>) =
        unique.iter().copied().unzip();
    let places = Places::new(
        Strided::from_slice(&bucket_collections),
        Strided::from_slice(&bucket_keys),
        unique.len(),
    );

    let fetched = kernel::read(db, txn.as_deref_mut(), &places, options, arena)?;
    let mut updated: Vec<Option<Vec<u8>>> = (0..unique.len())
        .map(|j| fetched.value(arena, j).map(<[u8]>::to_vec))
        .collect();

    // Apply the tasks in order; later tasks see earlier in-batch edits
    // of the same bucket.
    for i in 0..count {
        let path = required_path(paths, i)?;
        let j = unique.partition_point(|probe| *probe < located[i]);
        debug_assert!(j < unique.len() && unique[j] == located[i]);
        let current = updated[j].as_deref().unwrap_or(&[]);

        let next = match values.get(i)? {
            Some(value) if !value.is_empty() => Some(Some(bucket::upsert(current, path, value)?)),
            _ => match bucket::remove(current, path)? {
                Some(rebuilt) if rebuilt.is_empty() => Some(None),
                Some(rebuilt) => Some(Some(rebuilt)),
                None => None,
            },
        };
        if let Some(next) = next {
            updated[j] = next;
        }
    }

    let mut presences = Bitset::with_len(unique.len());
    let slices: Vec<&[u8]> = updated
        .iter()
        .enumerate()
        .map(|(j, rebuilt)| match rebuilt {
            Some(bytes) => {
                presences.set(j, true);
                bytes.as_slice()
            }
            None => &[],
        })
        .collect();
    let contents = Contents::new(
        Some(&presences),
        Strided::missing(),
        Strided::missing(),
        Strided::from_slice(&slices),
        unique.len(),
    );
    kernel::write(db, txn, &places, &contents, options)
}

/// Reads one path per task.
///
/// Bucket keys are not deduplicated: collisions are rare enough that a
/// repeated read costs less than sorting the batch. The matched values
/// are compacted in place on the arena, so the output has the same
/// columnar shape as a kernel read. A missing path reports
/// `presence = false` and [`LEN_MISSING`].
pub fn paths_read(
    db: &Database,
    txn: Option<&mut Transaction>,
    hasher: &PathHasher,
    collections: Strided<'_, CollectionId>,
    paths: &Contents<'_>,
    options: Options,
    arena: &mut Arena,
) -> CoreResult<ReadOutput> {
    let count = paths.count;
    let mut bucket_collections = Vec::with_capacity(count);
    let mut bucket_keys = Vec::with_capacity(count);
    for i in 0..count {
        let path = required_path(paths, i)?;
        bucket_collections.push(resolve_collection(&collections, i, options));
        bucket_keys.push(hasher.hash(path));
    }
    let places = Places::new(
        Strided::from_slice(&bucket_collections),
        Strided::from_slice(&bucket_keys),
        count,
    );
    let fetched = kernel::read(db, txn, &places, options, arena)?;

    // Locate each task's value inside its bucket on the tape.
    let mut matches: Vec<Option<(u32, u32)>> = Vec::with_capacity(count);
    for i in 0..count {
        let located = match fetched.value(arena, i) {
            Some(bytes) => Bucket::parse(bytes)?
                .find(required_path(paths, i)?)
                .map(|entry| {
                    (
                        fetched.offsets[i] + entry.value_start as u32,
                        entry.value.len() as u32,
                    )
                }),
            None => None,
        };
        matches.push(located);
    }

    // Compact the matched values to the front of the call's tape
    // region. Values only ever move left, so in-place moves are safe.
    let mut cursor = fetched.offsets.first().copied().unwrap_or(0);
    let mut out = ReadOutput {
        presences: Bitset::with_len(count),
        offsets: Vec::with_capacity(count),
        lengths: Vec::with_capacity(count),
    };
    for (i, located) in matches.into_iter().enumerate() {
        match located {
            Some((source, length)) => {
                arena.copy_within(source, length, cursor);
                out.presences.set(i, true);
                out.offsets.push(cursor);
                out.lengths.push(length);
                cursor += length;
            }
            None => {
                out.offsets.push(cursor);
                out.lengths.push(LEN_MISSING);
            }
        }
    }
    Ok(out)
}
