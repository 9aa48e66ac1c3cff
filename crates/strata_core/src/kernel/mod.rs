//! Batched I/O kernel.
//!
//! Every entry point operates on many `(collection, key)` tasks in one
//! call: inputs arrive as strided views, outputs are columnar, and the
//! fetched bytes land contiguously in the caller's [`Arena`]. Each
//! entry takes an optional transaction; the head-vs-transaction split
//! is an explicit match at the top of the call, not a trait object.
//!
//! [`Arena`]: crate::arena::Arena

mod read;
mod scan;
mod write;

pub use read::{measure, read, ReadOutput};
pub use scan::{scan, ScanArgs, ScanOutput};
pub use write::write;
