//! Scoped access guards
//!
//! Every byte of the file is reached through one of these guards. A guard
//! pairs the in-process gate with the OS advisory lock and a snapshot of the
//! header taken once the locks are held. Dropping the guard releases both,
//! on success and error paths alike.

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::error::{BstError, Result};

use super::header::Header;
use super::manager::StorageManager;
use super::Offset;

/// Read access to records, shared by both guard kinds
pub trait RecordRead {
    /// Header as of lock acquisition (plus this guard's own writes)
    fn header(&self) -> &Header;

    /// Read the raw, checksum-verified bytes of the record at `offset`
    fn read_record(&self, offset: Offset) -> Result<Vec<u8>>;
}

impl<T: RecordRead + ?Sized> RecordRead for &T {
    fn header(&self) -> &Header {
        (**self).header()
    }

    fn read_record(&self, offset: Offset) -> Result<Vec<u8>> {
        (**self).read_record(offset)
    }
}

// =============================================================================
// OS Lock Token
// =============================================================================

/// Releases the fs2 lock when dropped
pub(super) struct OsLock<'a> {
    storage: &'a StorageManager,
    exclusive: bool,
}

impl<'a> OsLock<'a> {
    pub(super) fn exclusive(storage: &'a StorageManager) -> Self {
        Self {
            storage,
            exclusive: true,
        }
    }

    /// Caller has already counted itself in `shared_holders`
    pub(super) fn shared(storage: &'a StorageManager) -> Self {
        Self {
            storage,
            exclusive: false,
        }
    }
}

impl Drop for OsLock<'_> {
    fn drop(&mut self) {
        if self.exclusive {
            self.storage.release_os();
            return;
        }

        // Last in-process reader gives the shared lock back
        let mut holders = self.storage.shared_holders.lock();
        *holders = holders.saturating_sub(1);
        if *holders == 0 {
            self.storage.release_os();
        }
    }
}

// =============================================================================
// Shared Guard
// =============================================================================

/// Read-only access; many may coexist
pub struct SharedGuard<'a> {
    storage: &'a StorageManager,
    // Field order is drop order: OS lock first, then the in-process gate
    _os: OsLock<'a>,
    _gate: RwLockReadGuard<'a, ()>,
    header: Header,
}

impl<'a> SharedGuard<'a> {
    pub(super) fn new(
        storage: &'a StorageManager,
        os: OsLock<'a>,
        gate: RwLockReadGuard<'a, ()>,
        header: Header,
    ) -> Self {
        Self {
            storage,
            _os: os,
            _gate: gate,
            header,
        }
    }
}

impl RecordRead for SharedGuard<'_> {
    fn header(&self) -> &Header {
        &self.header
    }

    fn read_record(&self, offset: Offset) -> Result<Vec<u8>> {
        self.storage.read_record_at(&self.header, offset)
    }
}

// =============================================================================
// Exclusive Guard
// =============================================================================

/// Sole read/write access; excludes every other guard in every process
pub struct ExclusiveGuard<'a> {
    storage: &'a StorageManager,
    _os: OsLock<'a>,
    _gate: RwLockWriteGuard<'a, ()>,
    header: Header,
}

impl<'a> ExclusiveGuard<'a> {
    pub(super) fn new(
        storage: &'a StorageManager,
        os: OsLock<'a>,
        gate: RwLockWriteGuard<'a, ()>,
        header: Header,
    ) -> Self {
        Self {
            storage,
            _os: os,
            _gate: gate,
            header,
        }
    }

    /// Overwrite the record at an already allocated offset
    pub fn write_record(&mut self, offset: Offset, bytes: &[u8]) -> Result<()> {
        self.header.check_offset(offset.get())?;
        self.check_len(bytes)?;
        self.storage.write_at(offset.get(), bytes)
    }

    /// Write `bytes` at the end of the record region and persist the new extent
    ///
    /// The record lands before the header advances, so a crash in between
    /// leaves only unreferenced bytes past `next_offset`.
    pub fn append_record(&mut self, bytes: &[u8]) -> Result<Offset> {
        self.check_len(bytes)?;

        let at = self.header.next_offset;
        let offset = Offset::new(at).ok_or_else(|| {
            BstError::CorruptHeader("next offset points at the header".to_string())
        })?;
        self.storage.write_at(at, bytes)?;

        let mut header = self.header;
        header.next_offset = at + header.record_len();
        self.write_header(header)?;
        Ok(offset)
    }

    /// Replace the on-disk header in a single write
    pub fn write_header(&mut self, header: Header) -> Result<()> {
        self.storage.write_at(0, &header.encode())?;
        self.header = header;
        Ok(())
    }

    /// Force everything written under this guard to durable storage
    pub fn flush(&mut self) -> Result<()> {
        self.storage.sync()
    }

    fn check_len(&self, bytes: &[u8]) -> Result<()> {
        let expected = self.header.record_len() as usize;
        if bytes.len() != expected {
            return Err(BstError::InvariantViolation(format!(
                "record buffer is {} bytes, layout requires {}",
                bytes.len(),
                expected
            )));
        }
        Ok(())
    }
}

impl RecordRead for ExclusiveGuard<'_> {
    fn header(&self) -> &Header {
        &self.header
    }

    fn read_record(&self, offset: Offset) -> Result<Vec<u8>> {
        self.storage.read_record_at(&self.header, offset)
    }
}
