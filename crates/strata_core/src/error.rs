//! Error types for the storage core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by the storage core.
///
/// `Display` strings carry stable prefixes, so callers that need to
/// classify a failure without matching on the enum may prefix-compare
/// the rendered message.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database construction or snapshot restore failed.
    #[error("open failed: {message}")]
    OpenFailed {
        /// Description of the failure.
        message: String,
    },

    /// Allocation failure inside the kernel or during commit reservation.
    #[error("out of memory")]
    Oom,

    /// An in-transaction read observed an entry that was overwritten
    /// after the transaction began.
    #[error("stale read: entry overwritten since the transaction began")]
    Stale,

    /// Commit detected a concurrent mutation of a key in the write-set
    /// or read-set.
    #[error("conflict: key overwritten by a newer commit")]
    Conflict,

    /// The same transaction attempted to apply its writes twice.
    #[error("reentrant commit: entry already stamped by this transaction")]
    Reentrant,

    /// Control request not implemented by this backend.
    #[error("unsupported: {what}")]
    Unsupported {
        /// The request that is not supported.
        what: String,
    },

    /// Missing required argument, mismatched batch shape, or a handle
    /// that does not belong to this database.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the argument issue.
        message: String,
    },

    /// Stored bytes did not parse or failed their checksum.
    #[error("corruption: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// I/O error while loading or persisting a snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Creates an open-failed error.
    pub fn open_failed(message: impl Into<String>) -> Self {
        Self::OpenFailed {
            message: message.into(),
        }
    }

    /// Creates an unsupported-operation error.
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported { what: what.into() }
    }

    /// Creates an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_prefixes() {
        assert!(CoreError::Stale.to_string().starts_with("stale read"));
        assert!(CoreError::Conflict.to_string().starts_with("conflict"));
        assert!(CoreError::Oom.to_string().starts_with("out of memory"));
        assert!(CoreError::invalid_argument("count is negative")
            .to_string()
            .starts_with("invalid argument"));
    }
}
