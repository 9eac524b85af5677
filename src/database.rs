//! Database Module
//!
//! The handle external callers use: opens the file, wires the storage
//! manager to the tree engine, and brackets every operation in the right lock.
//!
//! ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
//!
//! - **Writes** (put/delete/sync): one exclusive guard per call, held until
//!   the change is flushed. Excludes readers and writers in every process.
//! - **Reads** (get/contains/verify): one shared guard per call.
//! - **Scans** hold a shared guard for the life of the iterator, so writers
//!   wait until it is dropped. Do not write from a thread holding a scan.

use std::path::Path;

use crate::codec::NodeCodec;
use crate::config::Config;
use crate::error::{BstError, Result};
use crate::storage::{Header, RecordRead, SharedGuard, StorageManager};
use crate::tree::{InOrder, TreeEngine, TreeStats};

/// Lazy ascending `(key, value)` sequence holding a shared lock
pub type Scan<'a> = InOrder<SharedGuard<'a>>;

/// An open database file
pub struct Database {
    /// Configuration the file was opened with
    config: Config,

    /// Sole owner of the backing file
    storage: StorageManager,

    /// Tree operations over the storage manager's records
    tree: TreeEngine,
}

impl Database {
    /// Open or create a database with the given config
    ///
    /// On startup:
    /// 1. Validate the config
    /// 2. Open the file, writing a fresh header if it is empty
    /// 3. Adopt the record layout stored in the header
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let codec = NodeCodec::new(config.max_key_len, config.max_value_len);
        let initial = Header::new(
            layout_field("max_key_len", config.max_key_len)?,
            layout_field("max_value_len", config.max_value_len)?,
            u32::try_from(codec.record_size())
                .map_err(|_| BstError::Config("record size exceeds u32".to_string()))?,
        );

        let storage = StorageManager::open(&config, initial)?;
        let stored = *storage.shared()?.header();

        let codec = if (stored.max_key_len, stored.max_value_len)
            == (initial.max_key_len, initial.max_value_len)
        {
            codec
        } else {
            tracing::warn!(
                "{} uses record layout {}/{}, ignoring configured {}/{}",
                config.path.display(),
                stored.max_key_len,
                stored.max_value_len,
                config.max_key_len,
                config.max_value_len
            );
            NodeCodec::new(
                usize::from(stored.max_key_len),
                usize::from(stored.max_value_len),
            )
        };

        if codec.record_size() as u64 != stored.record_len() {
            return Err(BstError::CorruptHeader(format!(
                "record size {} does not match layout {}/{}",
                stored.record_size, stored.max_key_len, stored.max_value_len
            )));
        }

        tracing::debug!(
            "Database {} ready (record size {})",
            config.path.display(),
            codec.record_size()
        );

        Ok(Self {
            tree: TreeEngine::new(codec, config.reclaim_space),
            config,
            storage,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified file path
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().path(path).build();
        Self::open(config)
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let guard = self.storage.shared()?;
        self.tree.search(&guard, key)
    }

    /// Check whether a key is present
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Put a key-value pair, replacing any existing value
    ///
    /// Durable when it returns.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut guard = self.storage.exclusive()?;
        self.tree.insert(&mut guard, key, value)
    }

    /// Delete a key
    ///
    /// Returns `false` (not an error) when the key is absent.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        let mut guard = self.storage.exclusive()?;
        self.tree.delete(&mut guard, key)
    }

    /// Iterate over all entries in ascending key order
    ///
    /// Each call starts a fresh walk from the current root.
    pub fn scan(&self) -> Result<Scan<'_>> {
        let guard = self.storage.shared()?;
        Ok(self.tree.in_order(guard))
    }

    /// True when the tree has no live entries
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.storage.shared()?.header().root.is_none())
    }

    /// Check tree and free-list invariants and report record statistics
    pub fn verify(&self) -> Result<TreeStats> {
        let guard = self.storage.shared()?;
        self.tree.verify(&guard)
    }

    /// Force all written data to durable storage
    ///
    /// Every mutation already flushes; this covers `SyncStrategy::OsBuffered`.
    pub fn sync(&self) -> Result<()> {
        let mut guard = self.storage.exclusive()?;
        guard.flush()
    }

    /// Close the database gracefully
    ///
    /// Syncs, then releases the file handle and with it any OS lock.
    pub fn close(self) -> Result<()> {
        self.sync()?;
        tracing::debug!("Closed {}", self.config.path.display());
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the backing file path
    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    /// Size of every record in the file's layout
    pub fn record_size(&self) -> usize {
        self.tree.codec().record_size()
    }

    /// Get the storage manager
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn layout_field(name: &str, len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| BstError::Config(format!("{} {} exceeds u16", name, len)))
}
