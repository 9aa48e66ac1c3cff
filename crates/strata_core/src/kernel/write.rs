//! Batched writes: head upserts and transactional staging.

use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::strided::{Contents, Places};
use crate::transaction::Transaction;
use crate::types::{Options, KEY_UNKNOWN};

/// Writes one value per task. An absent value (cleared presence bit or
/// missing byte view) erases the key; an empty present value stores a
/// legal zero-length entry.
///
/// Head mode applies under the exclusive lock, stamping every mutation
/// with a fresh sequence; it is not atomic across tasks — the first
/// failure stops the batch and earlier tasks stay applied. Transaction
/// mode stages into the write-set, never touches the head, and never
/// advances the sequence counter.
pub fn write(
    db: &Database,
    txn: Option<&mut Transaction>,
    places: &Places<'_>,
    contents: &Contents<'_>,
    options: Options,
) -> CoreResult<()> {
    if contents.count != places.count {
        return Err(CoreError::invalid_argument(
            "value batch shape does not match the task count",
        ));
    }
    match txn {
        Some(txn) => write_txn(db, txn, places, contents, options),
        None => write_head(db, places, contents, options),
    }
}

fn copied(bytes: &[u8]) -> CoreResult<Vec<u8>> {
    u32::try_from(bytes.len())
        .map_err(|_| CoreError::invalid_argument("value exceeds the 4 GiB length limit"))?;
    let mut data = Vec::new();
    data.try_reserve_exact(bytes.len()).map_err(|_| CoreError::Oom)?;
    data.extend_from_slice(bytes);
    Ok(data)
}

fn write_head(
    db: &Database,
    places: &Places<'_>,
    contents: &Contents<'_>,
    options: Options,
) -> CoreResult<()> {
    let mut state = db.state().write();
    for i in 0..places.count {
        let collection_id = places.collection(i, options);
        let key = places.key(i)?;
        if key == KEY_UNKNOWN {
            return Err(CoreError::invalid_argument(
                "KEY_UNKNOWN is reserved and cannot be written",
            ));
        }
        let value = contents.get(i)?;
        let collection = state.collection_mut(collection_id)?;
        match value {
            Some(bytes) => {
                let data = copied(bytes)?;
                collection.reserve_more(1)?;
                collection.upsert(key, data, db.next_sequence());
            }
            None => {
                collection.erase(key);
                // Erasure is a mutation too; the clock keeps moving.
                let _ = db.next_sequence();
            }
        }
    }
    Ok(())
}

fn write_txn(
    db: &Database,
    txn: &mut Transaction,
    places: &Places<'_>,
    contents: &Contents<'_>,
    options: Options,
) -> CoreResult<()> {
    // The shared lock only guards collection removal while handles are
    // being resolved; staging itself is transaction-local.
    let state = db.state().read();
    for i in 0..places.count {
        let collection_id = places.collection(i, options);
        state.collection(collection_id)?;
        let key = places.key(i)?;
        if key == KEY_UNKNOWN {
            return Err(CoreError::invalid_argument(
                "KEY_UNKNOWN is reserved and cannot be written",
            ));
        }
        let staged = match contents.get(i)? {
            Some(bytes) => Some(copied(bytes)?),
            None => None,
        };
        txn.stage(collection_id, key, staged);
    }
    Ok(())
}
