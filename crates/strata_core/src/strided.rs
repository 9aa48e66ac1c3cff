//! Strided argument views for batched calls.
//!
//! Every kernel entry receives its per-task parameters through
//! [`Strided`] views: the same shape describes a broadcast constant
//! (stride 0), a densely packed slice (stride 1), and a padded column
//! (stride k). An empty view means the argument is absent and the
//! kernel substitutes its default, so callers never allocate scratch
//! just to satisfy a signature.

use crate::bitset::Bitset;
use crate::error::{CoreError, CoreResult};
use crate::types::{CollectionId, Key, Options, LEN_MISSING};

/// A strided view over `T` items.
#[derive(Debug, Clone, Copy)]
pub struct Strided<'a, T> {
    items: &'a [T],
    stride: usize,
}

impl<'a, T> Strided<'a, T> {
    /// An absent argument.
    #[must_use]
    pub const fn missing() -> Self {
        Self {
            items: &[],
            stride: 1,
        }
    }

    /// A densely packed view.
    #[must_use]
    pub const fn from_slice(items: &'a [T]) -> Self {
        Self { items, stride: 1 }
    }

    /// A single value broadcast to every task.
    #[must_use]
    pub fn broadcast(item: &'a T) -> Self {
        Self {
            items: std::slice::from_ref(item),
            stride: 0,
        }
    }

    /// A padded column taking every `stride`-th element of `items`.
    #[must_use]
    pub const fn with_stride(items: &'a [T], stride: usize) -> Self {
        Self { items, stride }
    }

    /// Returns true when the argument is absent.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the element for task `i`, or `None` when the view is
    /// absent or does not cover the task.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&'a T> {
        if self.stride == 0 {
            self.items.first()
        } else {
            self.items.get(i * self.stride)
        }
    }
}

/// The addressed side of a batch: one `(collection, key)` pair per task.
#[derive(Debug, Clone, Copy)]
pub struct Places<'a> {
    /// Collection per task; absent means the main collection.
    pub collections: Strided<'a, CollectionId>,
    /// Key per task.
    pub keys: Strided<'a, Key>,
    /// Number of tasks.
    pub count: usize,
}

impl<'a> Places<'a> {
    /// Builds a batch from explicit views.
    #[must_use]
    pub const fn new(
        collections: Strided<'a, CollectionId>,
        keys: Strided<'a, Key>,
        count: usize,
    ) -> Self {
        Self {
            collections,
            keys,
            count,
        }
    }

    /// All keys in the main collection.
    #[must_use]
    pub fn in_main(keys: &'a [Key]) -> Self {
        Self {
            collections: Strided::missing(),
            keys: Strided::from_slice(keys),
            count: keys.len(),
        }
    }

    /// All keys in one collection.
    #[must_use]
    pub fn in_collection(collection: &'a CollectionId, keys: &'a [Key]) -> Self {
        Self {
            collections: Strided::broadcast(collection),
            keys: Strided::from_slice(keys),
            count: keys.len(),
        }
    }

    /// Resolves the collection of task `i`, honoring
    /// [`Options::COLOCATED`] broadcasting.
    #[must_use]
    pub fn collection(&self, i: usize, options: Options) -> CollectionId {
        let slot = if options.contains(Options::COLOCATED) { 0 } else { i };
        self.collections
            .get(slot)
            .copied()
            .unwrap_or(CollectionId::MAIN)
    }

    /// Returns the key of task `i`.
    pub fn key(&self, i: usize) -> CoreResult<Key> {
        self.keys.get(i).copied().ok_or_else(|| {
            CoreError::invalid_argument("key view does not cover the task count")
        })
    }
}

/// The value side of a batch: presences, offsets, lengths and bytes.
///
/// A task's value resolves to `None` (absent) when its presence bit is
/// cleared, the byte view is absent, or its length is [`LEN_MISSING`].
/// On write, an absent value erases the key; an empty present value is
/// stored as a legal zero-length entry.
#[derive(Debug, Clone, Copy)]
pub struct Contents<'a> {
    /// Presence bit per task; absent means all present.
    pub presences: Option<&'a Bitset>,
    /// Byte offset of each value inside its slice; absent means zero.
    pub offsets: Strided<'a, u32>,
    /// Length of each value; absent means to the end of the slice.
    pub lengths: Strided<'a, u32>,
    /// Backing bytes per task.
    pub values: Strided<'a, &'a [u8]>,
    /// Number of tasks.
    pub count: usize,
}

impl<'a> Contents<'a> {
    /// Builds a batch from explicit views.
    #[must_use]
    pub const fn new(
        presences: Option<&'a Bitset>,
        offsets: Strided<'a, u32>,
        lengths: Strided<'a, u32>,
        values: Strided<'a, &'a [u8]>,
        count: usize,
    ) -> Self {
        Self {
            presences,
            offsets,
            lengths,
            values,
            count,
        }
    }

    /// One present value per task, each covering its whole slice.
    #[must_use]
    pub fn from_slices(values: &'a [&'a [u8]]) -> Self {
        Self {
            presences: None,
            offsets: Strided::missing(),
            lengths: Strided::missing(),
            values: Strided::from_slice(values),
            count: values.len(),
        }
    }

    /// An all-absent batch: every task erases its key.
    #[must_use]
    pub const fn erase_all(count: usize) -> Self {
        Self {
            presences: None,
            offsets: Strided::missing(),
            lengths: Strided::missing(),
            values: Strided::missing(),
            count,
        }
    }

    /// Resolves the value of task `i`.
    pub fn get(&self, i: usize) -> CoreResult<Option<&'a [u8]>> {
        if let Some(presences) = self.presences {
            if !presences.get(i) {
                return Ok(None);
            }
        }
        if self.values.is_missing() {
            return Ok(None);
        }
        let bytes = *self.values.get(i).ok_or_else(|| {
            CoreError::invalid_argument("value view does not cover the task count")
        })?;

        let offset = self.offsets.get(i).copied().unwrap_or(0) as usize;
        let length = if self.lengths.is_missing() {
            bytes.len().checked_sub(offset).ok_or_else(|| {
                CoreError::invalid_argument("value offset past the end of its slice")
            })?
        } else {
            let length = *self.lengths.get(i).ok_or_else(|| {
                CoreError::invalid_argument("length view does not cover the task count")
            })?;
            if length == LEN_MISSING {
                return Ok(None);
            }
            length as usize
        };

        bytes
            .get(offset..offset + length)
            .map(Some)
            .ok_or_else(|| CoreError::invalid_argument("value range past the end of its slice"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_returns_first_for_all() {
        let value = 7u32;
        let view = Strided::broadcast(&value);
        assert_eq!(view.get(0), Some(&7));
        assert_eq!(view.get(100), Some(&7));
    }

    #[test]
    fn padded_column() {
        // Column of every second element: 1, 3, 5.
        let backing = [1u32, 2, 3, 4, 5, 6];
        let view = Strided::with_stride(&backing, 2);
        assert_eq!(view.get(0), Some(&1));
        assert_eq!(view.get(1), Some(&3));
        assert_eq!(view.get(2), Some(&5));
        assert_eq!(view.get(3), None);
    }

    #[test]
    fn missing_collections_default_to_main() {
        let keys = [1, 2, 3];
        let places = Places::in_main(&keys);
        assert_eq!(places.collection(2, Options::NONE), CollectionId::MAIN);
    }

    #[test]
    fn colocated_broadcasts_first_collection() {
        let collections = [CollectionId::new(4), CollectionId::new(9)];
        let keys = [1, 2];
        let places = Places::new(
            Strided::from_slice(&collections),
            Strided::from_slice(&keys),
            2,
        );
        assert_eq!(places.collection(1, Options::NONE), CollectionId::new(9));
        assert_eq!(places.collection(1, Options::COLOCATED), CollectionId::new(4));
    }

    #[test]
    fn contents_windowing() {
        let joined: &[u8] = b"abcdef";
        let values = [joined, joined];
        let offsets = [0u32, 3];
        let lengths = [3u32, 3];
        let contents = Contents::new(
            None,
            Strided::from_slice(&offsets),
            Strided::from_slice(&lengths),
            Strided::from_slice(&values),
            2,
        );
        assert_eq!(contents.get(0).unwrap(), Some(&b"abc"[..]));
        assert_eq!(contents.get(1).unwrap(), Some(&b"def"[..]));
    }

    #[test]
    fn cleared_presence_is_absent() {
        let values: [&[u8]; 2] = [b"keep", b"gone"];
        let mut presences = Bitset::all_set(2);
        presences.set(1, false);
        let contents = Contents::new(
            Some(&presences),
            Strided::missing(),
            Strided::missing(),
            Strided::from_slice(&values),
            2,
        );
        assert_eq!(contents.get(0).unwrap(), Some(&b"keep"[..]));
        assert_eq!(contents.get(1).unwrap(), None);
    }

    #[test]
    fn missing_length_sentinel_is_absent() {
        let values: [&[u8]; 1] = [b"x"];
        let lengths = [LEN_MISSING];
        let contents = Contents::new(
            None,
            Strided::missing(),
            Strided::from_slice(&lengths),
            Strided::from_slice(&values),
            1,
        );
        assert_eq!(contents.get(0).unwrap(), None);
    }

    #[test]
    fn erase_all_is_all_absent() {
        let contents = Contents::erase_all(3);
        for i in 0..3 {
            assert_eq!(contents.get(i).unwrap(), None);
        }
    }

    #[test]
    fn out_of_range_window_is_an_error() {
        let values: [&[u8]; 1] = [b"ab"];
        let offsets = [1u32];
        let lengths = [5u32];
        let contents = Contents::new(
            None,
            Strided::from_slice(&offsets),
            Strided::from_slice(&lengths),
            Strided::from_slice(&values),
            1,
        );
        assert!(matches!(
            contents.get(0),
            Err(CoreError::InvalidArgument { .. })
        ));
    }
}
