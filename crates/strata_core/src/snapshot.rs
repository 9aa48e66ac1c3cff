//! Flat-file snapshots.
//!
//! The whole database is serialized as one little-endian,
//! length-prefixed blob with a CRC32 trailer: collection names, keys,
//! values, per-entry sequence numbers and the global sequence counter
//! all round-trip exactly.

use std::fs;
use std::path::Path;

use crate::database::DbState;
use crate::error::{CoreError, CoreResult};
use crate::types::SequenceNumber;

const MAGIC: [u8; 4] = *b"SKVS";
const VERSION: u16 = 1;

pub(crate) fn save(path: &Path, state: &DbState, youngest: SequenceNumber) -> CoreResult<()> {
    let mut body = Vec::new();
    body.extend_from_slice(&MAGIC);
    body.extend_from_slice(&VERSION.to_le_bytes());
    body.extend_from_slice(&youngest.as_u64().to_le_bytes());

    let live: Vec<_> = state.slots.iter().filter_map(Option::as_ref).collect();
    let count = u32::try_from(live.len())
        .map_err(|_| CoreError::invalid_argument("too many collections to snapshot"))?;
    body.extend_from_slice(&count.to_le_bytes());

    for collection in live {
        let name = collection.name().as_bytes();
        let name_len = u32::try_from(name.len())
            .map_err(|_| CoreError::invalid_argument("collection name too long to snapshot"))?;
        body.extend_from_slice(&name_len.to_le_bytes());
        body.extend_from_slice(name);
        body.extend_from_slice(&(collection.len() as u64).to_le_bytes());
        for (&key, entry) in collection.iter() {
            let value_len = u32::try_from(entry.data.len())
                .map_err(|_| CoreError::invalid_argument("value too long to snapshot"))?;
            body.extend_from_slice(&key.to_le_bytes());
            body.extend_from_slice(&entry.sequence.as_u64().to_le_bytes());
            body.extend_from_slice(&value_len.to_le_bytes());
            body.extend_from_slice(&entry.data);
        }
    }

    let crc = crc32fast::hash(&body);
    body.extend_from_slice(&crc.to_le_bytes());
    fs::write(path, body)?;
    Ok(())
}

pub(crate) fn load(path: &Path) -> CoreResult<(DbState, SequenceNumber)> {
    let bytes = fs::read(path)?;
    if bytes.len() < MAGIC.len() + 2 + 8 + 4 + 4 {
        return Err(CoreError::corrupt("snapshot shorter than its header"));
    }

    let (body, trailer) = bytes.split_at(bytes.len() - 4);
    let stored_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let actual_crc = crc32fast::hash(body);
    if stored_crc != actual_crc {
        return Err(CoreError::corrupt(format!(
            "snapshot checksum mismatch: stored {stored_crc:08x}, computed {actual_crc:08x}"
        )));
    }

    let mut reader = Reader { bytes: body, pos: 0 };
    if reader.take(MAGIC.len())? != MAGIC {
        return Err(CoreError::corrupt("snapshot magic bytes do not match"));
    }
    let version = reader.read_u16()?;
    if version != VERSION {
        return Err(CoreError::corrupt(format!(
            "snapshot format version {version} is not supported"
        )));
    }
    let youngest = SequenceNumber::new(reader.read_u64()?);

    let mut state = DbState::new();
    let collection_count = reader.read_u32()?;
    for _ in 0..collection_count {
        let name_len = reader.read_u32()? as usize;
        let name = std::str::from_utf8(reader.take(name_len)?)
            .map_err(|_| CoreError::corrupt("collection name is not UTF-8"))?
            .to_string();

        let entry_count = reader.read_u64()?;
        let target = if name.is_empty() {
            crate::types::CollectionId::MAIN
        } else {
            let id = crate::types::CollectionId::new(state.slots.len() as u32);
            state.slots.push(Some(crate::collection::Collection::new(name.clone())));
            state.names.insert(name, id);
            id
        };

        for _ in 0..entry_count {
            let key = reader.read_i64()?;
            let sequence = SequenceNumber::new(reader.read_u64()?);
            let value_len = reader.read_u32()? as usize;
            let data = reader.take(value_len)?.to_vec();
            state.collection_mut(target)?.upsert(key, data, sequence);
        }
    }

    if reader.pos != body.len() {
        return Err(CoreError::corrupt("snapshot has trailing bytes"));
    }
    Ok((state, youngest))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + len)
            .ok_or_else(|| CoreError::corrupt("snapshot truncated"))?;
        self.pos += len;
        Ok(slice)
    }

    fn read_u16(&mut self) -> CoreResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> CoreResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> CoreResult<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_i64(&mut self) -> CoreResult<i64> {
        Ok(self.read_u64()? as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CollectionId;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.snapshot");

        let mut state = DbState::new();
        state
            .collection_mut(CollectionId::MAIN)
            .unwrap()
            .upsert(34, b"alpha".to_vec(), SequenceNumber::new(3));
        let id = CollectionId::new(state.slots.len() as u32);
        state
            .slots
            .push(Some(crate::collection::Collection::new("events")));
        state.names.insert("events".to_string(), id);
        state
            .collection_mut(id)
            .unwrap()
            .upsert(-7, Vec::new(), SequenceNumber::new(9));

        save(&path, &state, SequenceNumber::new(12)).unwrap();
        let (restored, youngest) = load(&path).unwrap();

        assert_eq!(youngest, SequenceNumber::new(12));
        let main = restored.collection(CollectionId::MAIN).unwrap();
        assert_eq!(main.lookup(34).unwrap().data, b"alpha");
        assert_eq!(main.lookup(34).unwrap().sequence, SequenceNumber::new(3));
        let restored_id = restored.names["events"];
        let events = restored.collection(restored_id).unwrap();
        assert!(events.lookup(-7).unwrap().data.is_empty());
    }

    #[test]
    fn corrupted_snapshot_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.snapshot");
        save(&path, &DbState::new(), SequenceNumber::new(0)).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[6] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        assert!(matches!(load(&path), Err(CoreError::Corrupt { .. })));
    }

    #[test]
    fn truncated_snapshot_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.snapshot");
        fs::write(&path, b"SK").unwrap();
        assert!(matches!(load(&path), Err(CoreError::Corrupt { .. })));
    }
}
