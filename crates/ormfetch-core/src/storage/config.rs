//! Storage configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a SQLite-backed store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,

    /// Enforce foreign key constraints.
    pub foreign_keys: bool,

    /// How long to wait on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            foreign_keys: true,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    /// Create a config for a database file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Create a config for an in-memory database.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Set foreign key enforcement.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Check if this config opens an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}
