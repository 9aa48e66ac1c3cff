//! # StrataKV Core
//!
//! Transactional in-memory key-value substrate with a batched,
//! columnar I/O kernel.
//!
//! This crate provides:
//! - Named collections of `(i64 key, byte value)` pairs behind one
//!   database-wide reader-writer lock
//! - Snapshot-isolated transactions with optimistic commit validation
//! - A batched read/write/scan kernel taking strided argument views and
//!   materializing results into a caller-owned arena
//! - Optional flat-file snapshots restored on open and written on close
//!
//! Higher-level modalities (string paths, documents, graphs) are
//! clients of the kernel; only the paths layer ships in this workspace.
//!
//! ```rust,ignore
//! use strata_core::{kernel, Arena, Database, Options, Places};
//!
//! let db = Database::in_memory();
//! let keys = [34, 35];
//! let values: [&[u8]; 2] = [b"a", b"b"];
//! kernel::write(
//!     &db,
//!     None,
//!     &Places::in_main(&keys),
//!     &strata_core::Contents::from_slices(&values),
//!     Options::NONE,
//! )?;
//!
//! let mut arena = Arena::new();
//! let out = kernel::read(&db, None, &Places::in_main(&keys), Options::NONE, &mut arena)?;
//! assert_eq!(out.value(&arena, 0), Some(&b"a"[..]));
//! ```

#![warn(missing_docs)]

mod arena;
mod bitset;
mod collection;
mod config;
mod database;
mod error;
pub mod kernel;
mod snapshot;
mod strided;
mod transaction;
mod types;

pub use arena::Arena;
pub use bitset::Bitset;
pub use collection::{Collection, SequencedValue};
pub use config::Config;
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use strided::{Contents, Places, Strided};
pub use transaction::{overwritten_since, Transaction};
pub use types::{CollectionId, Key, Options, SequenceNumber, KEY_UNKNOWN, LEN_MISSING};
