//! File header
//!
//! The fixed metadata block at offset 0: format tag, record layout, tree root,
//! allocation counter and free-list head.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{BstError, Result};

use super::checksum::{seal, verify_seal};
use super::Offset;

/// Magic bytes identifying a bstdb file
const MAGIC: &[u8; 4] = b"BSTD";

/// Current on-disk format version
const VERSION: u16 = 1;

/// Header size; records start immediately after it
pub const HEADER_SIZE: u64 = 64;

/// Persistent tree metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Largest key a record can carry
    pub max_key_len: u16,
    /// Largest value a record can carry
    pub max_value_len: u16,
    /// Size of every record in bytes
    pub record_size: u32,
    /// Entry point of the tree (`None` when empty)
    pub root: Option<Offset>,
    /// Where the next appended record goes; also the end of the record region
    pub next_offset: u64,
    /// First record on the free list
    pub free_head: Option<Offset>,
}

impl Header {
    /// Header for a freshly created, empty file
    pub fn new(max_key_len: u16, max_value_len: u16, record_size: u32) -> Self {
        Self {
            max_key_len,
            max_value_len,
            record_size,
            root: None,
            next_offset: HEADER_SIZE,
            free_head: None,
        }
    }

    /// Serialize into the fixed 64-byte block, checksum included
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE as usize);
        buf.put_slice(MAGIC);
        buf.put_u16_le(VERSION);
        buf.put_u16_le(0);
        buf.put_u16_le(self.max_key_len);
        buf.put_u16_le(self.max_value_len);
        buf.put_u32_le(self.record_size);
        buf.put_u64_le(Offset::to_raw(self.root));
        buf.put_u64_le(self.next_offset);
        buf.put_u64_le(Offset::to_raw(self.free_head));
        // reserved + checksum slot
        buf.resize(HEADER_SIZE as usize, 0);

        let mut block = buf.to_vec();
        seal(&mut block);
        block
    }

    /// Parse and validate a header block
    pub fn decode(block: &[u8]) -> Result<Self> {
        if block.len() != HEADER_SIZE as usize {
            return Err(BstError::CorruptHeader(format!(
                "expected {} bytes, got {}",
                HEADER_SIZE,
                block.len()
            )));
        }
        if &block[0..4] != MAGIC {
            return Err(BstError::CorruptHeader(format!(
                "invalid magic: expected BSTD, got {:?}",
                &block[0..4]
            )));
        }
        if !verify_seal(block) {
            return Err(BstError::CorruptHeader("checksum mismatch".to_string()));
        }

        let mut buf = &block[4..];
        let version = buf.get_u16_le();
        if version != VERSION {
            return Err(BstError::CorruptHeader(format!(
                "unsupported format version: {}",
                version
            )));
        }
        let _reserved = buf.get_u16_le();

        let header = Self {
            max_key_len: buf.get_u16_le(),
            max_value_len: buf.get_u16_le(),
            record_size: buf.get_u32_le(),
            root: Offset::new(buf.get_u64_le()),
            next_offset: buf.get_u64_le(),
            free_head: Offset::new(buf.get_u64_le()),
        };
        header.validate()?;
        Ok(header)
    }

    /// Record size as a file length
    pub fn record_len(&self) -> u64 {
        u64::from(self.record_size)
    }

    /// Number of allocated record slots (live, tombstoned and free)
    pub fn record_count(&self) -> u64 {
        (self.next_offset - HEADER_SIZE) / self.record_len()
    }

    /// Fail with `OutOfRange` unless `offset` names an allocated record slot
    pub fn check_offset(&self, offset: u64) -> Result<()> {
        let aligned = offset >= HEADER_SIZE && (offset - HEADER_SIZE) % self.record_len() == 0;
        if !aligned || offset >= self.next_offset {
            return Err(BstError::OutOfRange {
                offset,
                extent: self.next_offset,
            });
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.max_key_len == 0 || self.max_value_len == 0 || self.record_size == 0 {
            return Err(BstError::CorruptHeader("empty record layout".to_string()));
        }
        if self.next_offset < HEADER_SIZE
            || (self.next_offset - HEADER_SIZE) % self.record_len() != 0
        {
            return Err(BstError::CorruptHeader(format!(
                "next offset {} is not on a record boundary",
                self.next_offset
            )));
        }
        for (name, pointer) in [("root", self.root), ("free head", self.free_head)] {
            if let Some(offset) = pointer {
                self.check_offset(offset.get()).map_err(|_| {
                    BstError::CorruptHeader(format!(
                        "{} {} lies outside the record region",
                        name, offset
                    ))
                })?;
            }
        }
        Ok(())
    }
}
