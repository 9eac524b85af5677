//! Structural verification
//!
//! Walks the whole file and checks the invariants the tree relies on:
//! - every reachable record is a live node, reached exactly once
//! - every key sits strictly between the bounds its ancestors impose
//! - the free list only holds free records and does not loop
//!
//! Records that are neither reachable nor on the free list are counted, not
//! rejected: an interrupted mutation can legitimately leave one behind.

use std::collections::HashSet;

use crate::codec::Record;
use crate::error::{BstError, Result};
use crate::storage::{Offset, RecordRead, HEADER_SIZE};

use super::engine::TreeEngine;
use super::read_node;

/// Summary produced by a successful verification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Live nodes reachable from the root
    pub live: u64,
    /// Tombstoned records (deleted with `reclaim_space` off)
    pub tombstones: u64,
    /// Records on the free list
    pub free: u64,
    /// Records not reachable from the root or the free list
    pub orphaned: u64,
    /// Allocated record slots of any kind
    pub total_records: u64,
    /// Longest root-to-leaf path, in nodes
    pub max_depth: u64,
}

/// A subtree still to be checked, with the open key interval it must respect
struct Pending {
    offset: Offset,
    lower: Option<Vec<u8>>,
    upper: Option<Vec<u8>>,
    depth: u64,
}

impl TreeEngine {
    /// Check every invariant of the tree and free list
    pub fn verify<S: RecordRead + ?Sized>(&self, store: &S) -> Result<TreeStats> {
        let header = *store.header();
        let mut stats = TreeStats {
            total_records: header.record_count(),
            ..TreeStats::default()
        };
        let mut seen: HashSet<Offset> = HashSet::new();

        // Reachable tree
        let mut stack: Vec<Pending> = header
            .root
            .map(|offset| Pending {
                offset,
                lower: None,
                upper: None,
                depth: 1,
            })
            .into_iter()
            .collect();

        while let Some(pending) = stack.pop() {
            if !seen.insert(pending.offset) {
                return Err(BstError::InvariantViolation(format!(
                    "record {} is linked more than once",
                    pending.offset
                )));
            }

            let node = read_node(&self.codec, store, pending.offset)?;
            let above_lower = pending.lower.as_deref().map_or(true, |lo| node.key.as_slice() > lo);
            let below_upper = pending.upper.as_deref().map_or(true, |hi| node.key.as_slice() < hi);
            if !above_lower || !below_upper {
                return Err(BstError::InvariantViolation(format!(
                    "key {:?} at {} is out of order",
                    String::from_utf8_lossy(&node.key),
                    pending.offset
                )));
            }

            stats.live += 1;
            stats.max_depth = stats.max_depth.max(pending.depth);

            if let Some(left) = node.left {
                stack.push(Pending {
                    offset: left,
                    lower: pending.lower.clone(),
                    upper: Some(node.key.clone()),
                    depth: pending.depth + 1,
                });
            }
            if let Some(right) = node.right {
                stack.push(Pending {
                    offset: right,
                    lower: Some(node.key),
                    upper: pending.upper,
                    depth: pending.depth + 1,
                });
            }
        }

        // Free list
        let mut cursor = header.free_head;
        while let Some(offset) = cursor {
            if !seen.insert(offset) {
                return Err(BstError::InvariantViolation(format!(
                    "free list revisits record {}",
                    offset
                )));
            }
            let raw = store.read_record(offset)?;
            match self
                .codec
                .decode_record(&raw)
                .map_err(|e| e.at_offset(offset.get()))?
            {
                Record::Free { next } => {
                    stats.free += 1;
                    cursor = next;
                }
                Record::Node(_) => {
                    return Err(BstError::InvariantViolation(format!(
                        "free list entry {} holds a node",
                        offset
                    )));
                }
            }
        }

        // Everything else
        for slot in 0..stats.total_records {
            let raw_offset = HEADER_SIZE + slot * header.record_len();
            let Some(offset) = Offset::new(raw_offset) else {
                continue;
            };
            if seen.contains(&offset) {
                continue;
            }
            let raw = store.read_record(offset)?;
            match self
                .codec
                .decode_record(&raw)
                .map_err(|e| e.at_offset(raw_offset))?
            {
                Record::Node(node) if node.deleted => stats.tombstones += 1,
                _ => stats.orphaned += 1,
            }
        }

        Ok(stats)
    }
}
