//! Storage Module
//!
//! Turns a single file into an offset-addressed, lockable record store.
//!
//! ## Responsibilities
//! - Create or validate the fixed header region
//! - Read/overwrite fixed-size records by offset
//! - Append-allocate new records and persist the allocation counter
//! - Single-writer / multi-reader locking, in-process and across processes
//!
//! The storage layer knows nothing about trees: a record is an opaque,
//! checksummed blob of `record_size` bytes.
//!
//! ## File Format
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ Header (64 bytes, offset 0)                                │
//! │   Magic "BSTD" (4) | Version u16 (2) | Reserved (2)        │
//! │   MaxKeyLen u16 (2) | MaxValueLen u16 (2) | RecordSize u32 │
//! │   Root u64 (8) | NextOffset u64 (8) | FreeHead u64 (8)     │
//! │   Reserved (20) | CRC32 of bytes 0..60 (4)                 │
//! ├────────────────────────────────────────────────────────────┤
//! │ Record 0 (record_size bytes, offset 64)                    │
//! │ Record 1 (offset 64 + record_size)                         │
//! │ ...                                                        │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Offset 0 is the header, so it doubles as the on-disk nil pointer.

mod checksum;
mod header;
mod lock;
mod manager;

use std::fmt;

pub use checksum::{seal, verify_seal, CHECKSUM_SIZE};
pub use header::{Header, HEADER_SIZE};
pub use lock::{ExclusiveGuard, RecordRead, SharedGuard};
pub use manager::StorageManager;

/// Byte position of a record within the backing file
///
/// Never zero: offset 0 holds the header, and a zero on disk means "no record".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Offset(u64);

impl Offset {
    /// Wrap a raw file position; zero maps to `None`
    pub fn new(raw: u64) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Raw byte position
    pub fn get(self) -> u64 {
        self.0
    }

    /// On-disk form of an optional offset (0 = nil)
    pub fn to_raw(offset: Option<Offset>) -> u64 {
        offset.map_or(0, Offset::get)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}
