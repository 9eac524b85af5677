//! Storage Manager
//!
//! Owns the backing file and every raw byte access to it.
//!
//! ## Responsibilities
//! - Create the header on first open, validate it afterwards
//! - Hand out scoped shared/exclusive guards (see `lock.rs`)
//! - Positioned reads and writes of headers and records

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use parking_lot::{Mutex, RwLock};

use crate::config::{Config, SyncStrategy};
use crate::error::{BstError, Result};

use super::checksum::verify_seal;
use super::header::{Header, HEADER_SIZE};
use super::lock::{ExclusiveGuard, OsLock, SharedGuard};
use super::Offset;

/// Pause between non-blocking lock attempts when a timeout is configured
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Manages the backing file
///
/// ## Concurrency:
/// - `gate`: in-process single writer / many readers, held for a whole operation
/// - `lock_handle`: OS advisory lock (fs2) for the same discipline across processes
/// - `file`: Mutex around the handle so each seek+read/write pair is indivisible
/// - `shared_holders`: in-process readers currently sharing the OS shared lock
pub struct StorageManager {
    /// Path of the backing file
    path: PathBuf,

    /// Handle used for all data I/O
    file: Mutex<File>,

    /// Duplicate of the handle, used only for advisory locking
    lock_handle: File,

    /// Operation-level reader/writer gate for this process
    pub(super) gate: RwLock<()>,

    /// How many in-process shared guards hold the OS shared lock
    pub(super) shared_holders: Mutex<usize>,

    /// Bound on lock acquisition (None = wait forever)
    lock_timeout: Option<Duration>,

    /// What `flush` does
    sync_strategy: SyncStrategy,
}

impl StorageManager {
    /// Open or create the backing file
    ///
    /// On startup:
    /// 1. Open (or create) the file read/write
    /// 2. Take the exclusive OS lock so concurrent creators don't race
    /// 3. Empty file → write `initial` as its header
    /// 4. Otherwise → validate the stored header against the file length
    pub fn open(config: &Config, initial: Header) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&config.path)?;
        let lock_handle = file.try_clone()?;

        let manager = Self {
            path: config.path.clone(),
            file: Mutex::new(file),
            lock_handle,
            gate: RwLock::new(()),
            shared_holders: Mutex::new(0),
            lock_timeout: config.lock_timeout,
            sync_strategy: config.sync_strategy,
        };

        {
            let _os = manager.lock_os_exclusive(manager.deadline())?;
            let file_len = manager.file_len()?;

            if file_len == 0 {
                tracing::debug!("Initializing new database file {}", manager.path.display());
                manager.write_at(0, &initial.encode())?;
                manager.file.lock().sync_all()?;
            } else if file_len < HEADER_SIZE {
                return Err(BstError::CorruptHeader(format!(
                    "file is {} bytes, shorter than the {}-byte header",
                    file_len, HEADER_SIZE
                )));
            } else {
                let header = manager.load_header()?;
                if header.next_offset > file_len {
                    return Err(BstError::CorruptHeader(format!(
                        "next offset {} lies past end of file ({} bytes)",
                        header.next_offset, file_len
                    )));
                }
                tracing::debug!(
                    "Opened {} ({} record slots, root {:?})",
                    manager.path.display(),
                    header.record_count(),
                    header.root
                );
            }
        }

        Ok(manager)
    }

    /// Acquire shared (read) access for the lifetime of the guard
    ///
    /// Shared guards nest: a thread holding one may take another.
    pub fn shared(&self) -> Result<SharedGuard<'_>> {
        let deadline = self.deadline();
        let gate = match deadline {
            Some(deadline) => self
                .gate
                .try_read_recursive_until(deadline)
                .ok_or_else(|| self.timed_out())?,
            None => self.gate.read_recursive(),
        };

        let os = {
            // Another reader may hold this while it waits on the OS lock
            let mut holders = match deadline {
                Some(deadline) => self
                    .shared_holders
                    .try_lock_until(deadline)
                    .ok_or_else(|| self.timed_out())?,
                None => self.shared_holders.lock(),
            };
            if *holders == 0 {
                self.acquire_os(false, deadline)?;
            }
            *holders += 1;
            OsLock::shared(self)
        };

        let header = self.load_header()?;
        Ok(SharedGuard::new(self, os, gate, header))
    }

    /// Acquire exclusive (write) access for the lifetime of the guard
    ///
    /// Blocks while any reader or writer, in this process or another, holds
    /// the file. Must not be called by a thread already holding a guard from
    /// this manager.
    pub fn exclusive(&self) -> Result<ExclusiveGuard<'_>> {
        let deadline = self.deadline();
        let gate = match deadline {
            Some(deadline) => self
                .gate
                .try_write_until(deadline)
                .ok_or_else(|| self.timed_out())?,
            None => self.gate.write(),
        };

        let os = self.lock_os_exclusive(deadline)?;
        let header = self.load_header()?;
        tracing::trace!("Exclusive lock acquired on {}", self.path.display());
        Ok(ExclusiveGuard::new(self, os, gate, header))
    }

    /// Get the backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the backing file in bytes
    pub fn file_len(&self) -> Result<u64> {
        Ok(self.file.lock().metadata()?.len())
    }

    // =========================================================================
    // Raw I/O (used by the guards)
    // =========================================================================

    pub(super) fn load_header(&self) -> Result<Header> {
        let mut block = vec![0u8; HEADER_SIZE as usize];
        match self.read_at(0, &mut block) {
            Ok(()) => Header::decode(&block),
            Err(BstError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => Err(
                BstError::CorruptHeader("file ends inside the header".to_string()),
            ),
            Err(e) => Err(e),
        }
    }

    pub(super) fn read_record_at(&self, header: &Header, offset: Offset) -> Result<Vec<u8>> {
        header.check_offset(offset.get())?;

        let mut record = vec![0u8; header.record_len() as usize];
        match self.read_at(offset.get(), &mut record) {
            Ok(()) => {}
            Err(BstError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(BstError::OutOfRange {
                    offset: offset.get(),
                    extent: self.file_len()?,
                });
            }
            Err(e) => return Err(e),
        }

        if !verify_seal(&record) {
            return Err(BstError::corrupt_record(offset.get(), "checksum mismatch"));
        }
        Ok(record)
    }

    pub(super) fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(buf)?;
        Ok(())
    }

    pub(super) fn write_at(&self, pos: u64, bytes: &[u8]) -> Result<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(pos))?;
        file.write_all(bytes)?;
        Ok(())
    }

    pub(super) fn sync(&self) -> Result<()> {
        let mut file = self.file.lock();
        file.flush()?;
        if self.sync_strategy == SyncStrategy::EveryWrite {
            file.sync_data()?;
        }
        Ok(())
    }

    // =========================================================================
    // Advisory Locking
    // =========================================================================

    fn deadline(&self) -> Option<Instant> {
        self.lock_timeout.map(|timeout| Instant::now() + timeout)
    }

    fn timed_out(&self) -> BstError {
        BstError::LockTimeout(self.lock_timeout.unwrap_or(Duration::ZERO))
    }

    /// Take the exclusive OS lock and wrap it so it is released on drop
    fn lock_os_exclusive(&self, deadline: Option<Instant>) -> Result<OsLock<'_>> {
        self.acquire_os(true, deadline)?;
        Ok(OsLock::exclusive(self))
    }

    fn acquire_os(&self, exclusive: bool, deadline: Option<Instant>) -> Result<()> {
        let Some(deadline) = deadline else {
            if exclusive {
                FileExt::lock_exclusive(&self.lock_handle)?;
            } else {
                FileExt::lock_shared(&self.lock_handle)?;
            }
            return Ok(());
        };

        let contended = fs2::lock_contended_error().kind();
        loop {
            let attempt = if exclusive {
                FileExt::try_lock_exclusive(&self.lock_handle)
            } else {
                FileExt::try_lock_shared(&self.lock_handle)
            };
            match attempt {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == contended => {
                    if Instant::now() >= deadline {
                        return Err(self.timed_out());
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub(super) fn release_os(&self) {
        if let Err(e) = FileExt::unlock(&self.lock_handle) {
            tracing::warn!("Failed to release lock on {}: {}", self.path.display(), e);
        }
    }
}
