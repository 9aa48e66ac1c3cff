//! Database configuration.

use std::path::PathBuf;

/// Configuration for opening a database.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Path of the snapshot file to restore from and persist to.
    /// `None` keeps the database purely in memory.
    pub snapshot_path: Option<PathBuf>,

    /// Whether to write the snapshot back when the database is closed.
    /// Only meaningful when `snapshot_path` is set.
    pub snapshot_on_close: bool,
}

impl Config {
    /// Creates an in-memory configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the `open` config string.
    ///
    /// An empty string selects a purely in-memory database; anything
    /// else is taken as the snapshot path.
    #[must_use]
    pub fn from_str(config: &str) -> Self {
        if config.is_empty() {
            Self::default()
        } else {
            Self {
                snapshot_path: Some(PathBuf::from(config)),
                snapshot_on_close: true,
            }
        }
    }

    /// Sets the snapshot path.
    #[must_use]
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Sets whether closing writes the snapshot back.
    #[must_use]
    pub const fn snapshot_on_close(mut self, value: bool) -> Self {
        self.snapshot_on_close = value;
        self
    }
}
