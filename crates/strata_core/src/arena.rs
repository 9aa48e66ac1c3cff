//! Per-call output arena.
//!
//! Every batched kernel call materializes its fetched values into one
//! contiguous byte tape owned by the caller. Outputs reference the tape
//! by `(offset, length)` pairs, so a whole batch costs a single
//! allocation. The tape is reset at the start of each call unless the
//! caller passes [`Options::DONT_DISCARD_MEMORY`], in which case new
//! values append after the previous call's.

use crate::error::{CoreError, CoreResult};
use crate::types::Options;

/// Growable byte tape backing the outputs of one batched call.
#[derive(Debug, Default)]
pub struct Arena {
    tape: Vec<u8>,
}

impl Arena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares the arena for a new kernel call.
    pub fn begin_call(&mut self, options: Options) {
        if !options.contains(Options::DONT_DISCARD_MEMORY) {
            self.tape.clear();
        }
    }

    /// Reserves room for `additional` bytes, surfacing allocation
    /// failure as [`CoreError::Oom`] instead of aborting.
    pub fn reserve(&mut self, additional: usize) -> CoreResult<()> {
        self.tape.try_reserve(additional).map_err(|_| CoreError::Oom)
    }

    /// Appends `bytes` to the tape and returns their offset.
    pub fn push(&mut self, bytes: &[u8]) -> CoreResult<u32> {
        let offset = self.offset()?;
        self.reserve(bytes.len())?;
        self.tape.extend_from_slice(bytes);
        Ok(offset)
    }

    /// The tape position the next `push` would return.
    pub fn offset(&self) -> CoreResult<u32> {
        u32::try_from(self.tape.len())
            .map_err(|_| CoreError::invalid_argument("batched output exceeds the 4 GiB tape limit"))
    }

    /// Returns the number of bytes currently on the tape.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tape.len()
    }

    /// Returns true when the tape is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tape.is_empty()
    }

    /// Returns the whole tape.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.tape
    }

    /// Returns the tape slice at `(offset, len)`.
    ///
    /// # Panics
    ///
    /// Panics if the range was not produced by this arena's `push`.
    #[must_use]
    pub fn slice(&self, offset: u32, len: u32) -> &[u8] {
        &self.tape[offset as usize..offset as usize + len as usize]
    }

    /// Moves `len` bytes from `src` to `dst` within the tape. Ranges
    /// may overlap; `dst` must not extend past the current tape end.
    pub fn copy_within(&mut self, src: u32, len: u32, dst: u32) {
        self.tape.copy_within(
            src as usize..src as usize + len as usize,
            dst as usize,
        );
    }
}
