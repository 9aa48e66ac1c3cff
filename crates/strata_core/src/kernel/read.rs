//! Batched reads: measure and fetch.

use crate::arena::Arena;
use crate::bitset::Bitset;
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::strided::Places;
use crate::transaction::{overwritten_since, Transaction};
use crate::types::{Options, LEN_MISSING};

/// Columnar result of a fetch-mode read. The value bytes live on the
/// caller's arena; each task is described by a presence bit and an
/// `(offset, length)` pair into the tape.
#[derive(Debug)]
pub struct ReadOutput {
    /// Presence bit per task.
    pub presences: Bitset,
    /// Tape offset per task. Absent tasks point at the position the
    /// next value would have taken.
    pub offsets: Vec<u32>,
    /// Value length per task; [`LEN_MISSING`] marks an absent value.
    pub lengths: Vec<u32>,
}

impl ReadOutput {
    fn with_capacity(count: usize) -> Self {
        Self {
            presences: Bitset::with_len(count),
            offsets: Vec::with_capacity(count),
            lengths: Vec::with_capacity(count),
        }
    }

    fn push_present(&mut self, i: usize, offset: u32, length: u32) {
        self.presences.set(i, true);
        self.offsets.push(offset);
        self.lengths.push(length);
    }

    fn push_missing(&mut self, offset: u32) {
        self.offsets.push(offset);
        self.lengths.push(LEN_MISSING);
    }

    /// Returns the number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    /// Returns true when the batch had no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Returns the value of task `i`, or `None` when absent.
    #[must_use]
    pub fn value<'a>(&self, arena: &'a Arena, i: usize) -> Option<&'a [u8]> {
        if !self.presences.get(i) {
            return None;
        }
        Some(arena.slice(self.offsets[i], self.lengths[i]))
    }
}

fn value_length(data: &[u8]) -> CoreResult<u32> {
    u32::try_from(data.len())
        .map_err(|_| CoreError::invalid_argument("stored value exceeds the 4 GiB length limit"))
}

/// Measure-only read: per-task value lengths, [`LEN_MISSING`] for
/// absent keys. Does not touch the arena.
pub fn measure(
    db: &Database,
    txn: Option<&mut Transaction>,
    places: &Places<'_>,
    options: Options,
) -> CoreResult<Vec<u32>> {
    match txn {
        Some(txn) => measure_txn(db, txn, places, options),
        None => measure_head(db, places, options),
    }
}

/// Fetch-mode read: one pass sizes the batch, a second copies every
/// present value contiguously into the arena.
pub fn read(
    db: &Database,
    txn: Option<&mut Transaction>,
    places: &Places<'_>,
    options: Options,
    arena: &mut Arena,
) -> CoreResult<ReadOutput> {
    match txn {
        Some(txn) => read_txn(db, txn, places, options, arena),
        None => read_head(db, places, options, arena),
    }
}

fn measure_head(
    db: &Database,
    places: &Places<'_>,
    options: Options,
) -> CoreResult<Vec<u32>> {
    let state = db.state().read();
    let mut lengths = Vec::with_capacity(places.count);
    for i in 0..places.count {
        let collection = state.collection(places.collection(i, options))?;
        lengths.push(match collection.lookup(places.key(i)?) {
            Some(entry) => value_length(&entry.data)?,
            None => LEN_MISSING,
        });
    }
    Ok(lengths)
}

fn read_head(
    db: &Database,
    places: &Places<'_>,
    options: Options,
    arena: &mut Arena,
) -> CoreResult<ReadOutput> {
    arena.begin_call(options);
    let state = db.state().read();

    let mut total = 0usize;
    for i in 0..places.count {
        let collection = state.collection(places.collection(i, options))?;
        if let Some(entry) = collection.lookup(places.key(i)?) {
            total += entry.data.len();
        }
    }
    arena.reserve(total)?;

    let mut out = ReadOutput::with_capacity(places.count);
    for i in 0..places.count {
        let collection = state.collection(places.collection(i, options))?;
        match collection.lookup(places.key(i)?) {
            Some(entry) => {
                let length = value_length(&entry.data)?;
                let offset = arena.push(&entry.data)?;
                out.push_present(i, offset, length);
            }
            None => out.push_missing(arena.offset()?),
        }
    }
    Ok(out)
}

fn measure_txn(
    db: &Database,
    txn: &mut Transaction,
    places: &Places<'_>,
    options: Options,
) -> CoreResult<Vec<u32>> {
    let state = db.state().read();
    let youngest = db.youngest();
    let mut lengths = Vec::with_capacity(places.count);

    for i in 0..places.count {
        let collection_id = places.collection(i, options);
        let collection = state.collection(collection_id)?;
        let key = places.key(i)?;

        if let Some(staged) = txn.staged(collection_id, key) {
            lengths.push(match staged {
                Some(value) => value_length(value)?,
                None => LEN_MISSING,
            });
            continue;
        }

        match collection.lookup(key) {
            Some(entry) => {
                if overwritten_since(entry.sequence, txn.start_sequence(), youngest) {
                    return Err(CoreError::Stale);
                }
                let length = value_length(&entry.data)?;
                let observed = entry.sequence;
                if !options.contains(Options::TRANSPARENT_READ) {
                    txn.record_read(collection_id, key, observed);
                }
                lengths.push(length);
            }
            None => lengths.push(LEN_MISSING),
        }
    }
    Ok(lengths)
}

fn read_txn(
    db: &Database,
    txn: &mut Transaction,
    places: &Places<'_>,
    options: Options,
    arena: &mut Arena,
) -> CoreResult<ReadOutput> {
    arena.begin_call(options);
    let state = db.state().read();
    let youngest = db.youngest();

    // First pass: stale checks and total size, before the arena is
    // touched. Staged values are copied to the tape as well, so one
    // output shape serves both sources.
    let mut total = 0usize;
    for i in 0..places.count {
        let collection_id = places.collection(i, options);
        let collection = state.collection(collection_id)?;
        let key = places.key(i)?;

        if let Some(staged) = txn.staged(collection_id, key) {
            total += staged.map_or(0, <[u8]>::len);
            continue;
        }
        if let Some(entry) = collection.lookup(key) {
            if overwritten_since(entry.sequence, txn.start_sequence(), youngest) {
                return Err(CoreError::Stale);
            }
            total += entry.data.len();
        }
    }
    arena.reserve(total)?;

    let mut out = ReadOutput::with_capacity(places.count);
    for i in 0..places.count {
        let collection_id = places.collection(i, options);
        let collection = state.collection(collection_id)?;
        let key = places.key(i)?;

        if let Some(staged) = txn.staged(collection_id, key) {
            match staged {
                Some(value) => {
                    let length = value_length(value)?;
                    let offset = arena.push(value)?;
                    out.push_present(i, offset, length);
                }
                None => out.push_missing(arena.offset()?),
            }
            continue;
        }

        match collection.lookup(key) {
            Some(entry) => {
                let length = value_length(&entry.data)?;
                let offset = arena.push(&entry.data)?;
                let observed = entry.sequence;
                if !options.contains(Options::TRANSPARENT_READ) {
                    txn.record_read(collection_id, key, observed);
                }
                out.push_present(i, offset, length);
            }
            None => out.push_missing(arena.offset()?),
        }
    }
    Ok(out)
}
