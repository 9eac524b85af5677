//! Record allocation policy
//!
//! With `reclaim_space` on, retired records go onto a free list whose head
//! lives in the header and whose links live in each free record. With it off,
//! retired records become tombstones and the file only grows.

use crate::codec::{Node, Record};
use crate::error::{BstError, Result};
use crate::storage::{ExclusiveGuard, Offset, RecordRead};

use super::engine::TreeEngine;

impl TreeEngine {
    /// Store `bytes` in a slot nothing points at yet
    ///
    /// A free slot is popped off the list (header write) before it is filled,
    /// so a crash in between leaks the slot rather than leaving the list
    /// pointing at a node.
    pub(super) fn allocate(&self, guard: &mut ExclusiveGuard<'_>, bytes: &[u8]) -> Result<Offset> {
        if self.reclaim_space {
            if let Some(slot) = guard.header().free_head {
                let raw = guard.read_record(slot)?;
                let next = match self
                    .codec
                    .decode_record(&raw)
                    .map_err(|e| e.at_offset(slot.get()))?
                {
                    Record::Free { next } => next,
                    Record::Node(_) => {
                        return Err(BstError::corrupt_record(
                            slot.get(),
                            "free list entry holds a node",
                        ))
                    }
                };

                let mut header = *guard.header();
                header.free_head = next;
                guard.write_header(header)?;
                guard.write_record(slot, bytes)?;
                tracing::trace!("Reused free record {}", slot);
                return Ok(slot);
            }
        }

        guard.append_record(bytes)
    }

    /// Retire a record that has already been unlinked from the tree
    pub(super) fn release(
        &self,
        guard: &mut ExclusiveGuard<'_>,
        offset: Offset,
        mut node: Node,
    ) -> Result<()> {
        if self.reclaim_space {
            let free = self.codec.encode_free(guard.header().free_head);
            guard.write_record(offset, &free)?;

            let mut header = *guard.header();
            header.free_head = Some(offset);
            guard.write_header(header)
        } else {
            node.deleted = true;
            node.left = None;
            node.right = None;
            let tombstone = self.codec.encode(&node)?;
            guard.write_record(offset, &tombstone)
        }
    }
}
