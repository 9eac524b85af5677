//! Configuration for bstdb
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BstError, Result};

/// Main configuration for a bstdb database file
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // File Configuration
    // -------------------------------------------------------------------------
    /// Path of the single backing file (created if missing)
    pub path: PathBuf,

    // -------------------------------------------------------------------------
    // Record Layout
    // -------------------------------------------------------------------------
    /// Largest key a record can hold (bytes)
    ///
    /// Only applied when the file is created; an existing file keeps the
    /// layout stored in its header.
    pub max_key_len: usize,

    /// Largest value a record can hold (bytes)
    pub max_value_len: usize,

    // -------------------------------------------------------------------------
    // Durability / Space
    // -------------------------------------------------------------------------
    /// How `flush` makes writes durable
    pub sync_strategy: SyncStrategy,

    /// Reuse deleted records for new inserts (free list) instead of leaving tombstones
    pub reclaim_space: bool,

    // -------------------------------------------------------------------------
    // Locking
    // -------------------------------------------------------------------------
    /// Bound on lock acquisition; `None` blocks until the lock is available
    pub lock_timeout: Option<Duration>,
}

/// Flush strategy applied at the end of every mutating operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fdatasync after every mutation (safest, slowest)
    EveryWrite,

    /// Hand writes to the OS without forcing them to the device
    OsBuffered,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./bstdb.db"),
            max_key_len: 255,
            max_value_len: 4096,
            sync_strategy: SyncStrategy::EveryWrite,
            reclaim_space: true,
            lock_timeout: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the record layout can be represented on disk
    pub fn validate(&self) -> Result<()> {
        for (name, len) in [
            ("max_key_len", self.max_key_len),
            ("max_value_len", self.max_value_len),
        ] {
            if len == 0 || len > u16::MAX as usize {
                return Err(BstError::Config(format!(
                    "{} must be between 1 and {}, got {}",
                    name,
                    u16::MAX,
                    len
                )));
            }
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the backing file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the maximum key length (in bytes)
    pub fn max_key_len(mut self, len: usize) -> Self {
        self.config.max_key_len = len;
        self
    }

    /// Set the maximum value length (in bytes)
    pub fn max_value_len(mut self, len: usize) -> Self {
        self.config.max_value_len = len;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Enable or disable free-list reuse of deleted records
    pub fn reclaim_space(mut self, reclaim: bool) -> Self {
        self.config.reclaim_space = reclaim;
        self
    }

    /// Bound lock acquisition
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
