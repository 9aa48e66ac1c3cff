//! # StrataKV Paths
//!
//! Variable-length string keys layered over the integer-key kernel.
//!
//! Every path hashes to a bucket key; all paths sharing that key are
//! packed into one bucket value (see [`bucket`]). The layer is a pure
//! client of the `strata_core` batched API: writes fetch, rebuild and
//! store whole buckets, reads unpack them, and prefix matching walks
//! the bucket keys with paginated kernel scans. Collisions are routine
//! and never corrupt unrelated paths.

#![warn(missing_docs)]

pub mod bucket;
mod hash;
mod matcher;
mod ops;

pub use hash::PathHasher;
pub use matcher::{paths_match, MatchOutput};
pub use ops::{paths_read, paths_write};
