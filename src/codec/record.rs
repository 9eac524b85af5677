//! Record encoding and decoding

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{BstError, Result};
use crate::storage::{seal, verify_seal, Offset, CHECKSUM_SIZE};

use super::node::{Node, Record, RecordTag};

/// Tag (1) + KeyLen (2) + ValLen (2) + Left (8) + Right (8)
const PREFIX_SIZE: usize = 21;

/// Fixed bytes per record on top of the key and value areas
pub const RECORD_OVERHEAD: usize = PREFIX_SIZE + CHECKSUM_SIZE;

/// Encoder/decoder for one record layout
///
/// Every record is exactly [`record_size`](Self::record_size) bytes, so the
/// same codec must be used for the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeCodec {
    max_key_len: usize,
    max_value_len: usize,
}

impl NodeCodec {
    pub fn new(max_key_len: usize, max_value_len: usize) -> Self {
        Self {
            max_key_len,
            max_value_len,
        }
    }

    pub fn max_key_len(&self) -> usize {
        self.max_key_len
    }

    pub fn max_value_len(&self) -> usize {
        self.max_value_len
    }

    /// Size of every record in this layout
    pub fn record_size(&self) -> usize {
        RECORD_OVERHEAD + self.max_key_len + self.max_value_len
    }

    /// Fail with `RecordTooLarge` if the payload does not fit this layout
    pub fn check_fits(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.len() > self.max_key_len {
            return Err(BstError::RecordTooLarge {
                field: "key",
                len: key.len(),
                max: self.max_key_len,
            });
        }
        if value.len() > self.max_value_len {
            return Err(BstError::RecordTooLarge {
                field: "value",
                len: value.len(),
                max: self.max_value_len,
            });
        }
        Ok(())
    }

    /// Encode a live or tombstoned node
    ///
    /// Deterministic: padding is always zero, so equal nodes give equal bytes.
    pub fn encode(&self, node: &Node) -> Result<Vec<u8>> {
        self.check_fits(&node.key, &node.value)?;

        let tag = if node.deleted {
            RecordTag::Deleted
        } else {
            RecordTag::Live
        };

        let key_len = length_field("key", node.key.len())?;
        let value_len = length_field("value", node.value.len())?;

        let mut buf = BytesMut::with_capacity(self.record_size());
        buf.put_u8(tag as u8);
        buf.put_u16_le(key_len);
        buf.put_u16_le(value_len);
        buf.put_u64_le(Offset::to_raw(node.left));
        buf.put_u64_le(Offset::to_raw(node.right));
        buf.put_slice(&node.key);
        buf.put_bytes(0, self.max_key_len - node.key.len());
        buf.put_slice(&node.value);
        buf.put_bytes(0, self.max_value_len - node.value.len());
        buf.put_bytes(0, CHECKSUM_SIZE);

        Ok(sealed(buf))
    }

    /// Encode an empty slot that links to `next` on the free list
    pub fn encode_free(&self, next: Option<Offset>) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.record_size());
        buf.put_u8(RecordTag::Free as u8);
        buf.put_u16_le(0);
        buf.put_u16_le(0);
        buf.put_u64_le(Offset::to_raw(next));
        buf.put_u64_le(0);
        buf.put_bytes(0, self.max_key_len + self.max_value_len + CHECKSUM_SIZE);

        sealed(buf)
    }

    /// Decode a record that must hold a node (live or tombstoned)
    pub fn decode(&self, bytes: &[u8]) -> Result<Node> {
        match self.decode_record(bytes)? {
            Record::Node(node) => Ok(node),
            Record::Free { .. } => Err(BstError::corrupt_record(
                0,
                "expected a node, found a free slot",
            )),
        }
    }

    /// Decode any record
    ///
    /// Errors carry offset 0; callers that know the offset attach it.
    pub fn decode_record(&self, bytes: &[u8]) -> Result<Record> {
        if bytes.len() != self.record_size() {
            return Err(BstError::corrupt_record(
                0,
                format!(
                    "record is {} bytes, layout requires {}",
                    bytes.len(),
                    self.record_size()
                ),
            ));
        }
        if !verify_seal(bytes) {
            return Err(BstError::corrupt_record(0, "checksum mismatch"));
        }

        let mut buf = bytes;
        let tag_byte = buf.get_u8();
        let tag = RecordTag::from_byte(tag_byte).ok_or_else(|| {
            BstError::corrupt_record(0, format!("unknown record tag 0x{:02x}", tag_byte))
        })?;
        let key_len = buf.get_u16_le() as usize;
        let value_len = buf.get_u16_le() as usize;
        let left = Offset::new(buf.get_u64_le());
        let right = Offset::new(buf.get_u64_le());

        if tag == RecordTag::Free {
            return Ok(Record::Free { next: left });
        }

        if key_len > self.max_key_len || value_len > self.max_value_len {
            return Err(BstError::corrupt_record(
                0,
                format!(
                    "declared lengths {}/{} exceed layout {}/{}",
                    key_len, value_len, self.max_key_len, self.max_value_len
                ),
            ));
        }

        let key = buf[..key_len].to_vec();
        buf.advance(self.max_key_len);
        let value = buf[..value_len].to_vec();

        Ok(Record::Node(Node {
            key,
            value,
            left,
            right,
            deleted: tag == RecordTag::Deleted,
        }))
    }
}

/// Lengths are stored as u16 regardless of the configured maximum
fn length_field(field: &'static str, len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| BstError::RecordTooLarge {
        field,
        len,
        max: u16::MAX as usize,
    })
}

fn sealed(buf: BytesMut) -> Vec<u8> {
    let mut record = buf.to_vec();
    seal(&mut record);
    record
}
