//! Tree Engine Module
//!
//! Binary search tree whose nodes live in file records and point at each
//! other by offset.
//!
//! ## Responsibilities
//! - search / insert / delete / in-order traversal over on-disk nodes
//! - Root offset kept in the file header, re-read at every lock acquisition
//! - Record allocation policy (free list or tombstones)
//! - Structural verification
//!
//! ## Mutation Ordering
//! Every mutation writes new or replacement records first and updates the
//! single parent pointer (or header root) last. A crash in between leaves
//! the old tree intact plus at most one unreachable record.
//!
//! ## Known Limitation
//! There is no rebalancing: adversarial (e.g. sorted) insert order yields a
//! tree of depth O(n). All walks are iterative, so depth costs disk reads but
//! never call-stack space.

mod alloc;
mod engine;
mod iterator;
mod verify;

pub use engine::TreeEngine;
pub use iterator::InOrder;
pub use verify::TreeStats;

use crate::codec::{Node, NodeCodec};
use crate::error::{BstError, Result};
use crate::storage::{Offset, RecordRead};

/// Read the node at `offset`, refusing tombstones and free slots
///
/// Anything reachable from the root must be live; finding otherwise means the
/// file is damaged, and returning its payload would be returning a wrong value.
pub(crate) fn read_node<S: RecordRead + ?Sized>(
    codec: &NodeCodec,
    store: &S,
    offset: Offset,
) -> Result<Node> {
    let bytes = store.read_record(offset)?;
    let node = codec
        .decode(&bytes)
        .map_err(|e| e.at_offset(offset.get()))?;
    if node.deleted {
        return Err(BstError::corrupt_record(
            offset.get(),
            "tombstoned record is still linked into the tree",
        ));
    }
    Ok(node)
}

/// Upper bound on node visits for one walk
///
/// A healthy tree never revisits a record, so a walk longer than the number of
/// allocated slots can only mean a pointer cycle.
pub(crate) struct StepBudget {
    remaining: u64,
}

impl StepBudget {
    pub(crate) fn for_store<S: RecordRead + ?Sized>(store: &S) -> Self {
        Self {
            remaining: store.header().record_count(),
        }
    }

    pub(crate) fn step(&mut self) -> Result<()> {
        if self.remaining == 0 {
            return Err(BstError::InvariantViolation(
                "walk exceeded record count: child pointers form a cycle".to_string(),
            ));
        }
        self.remaining -= 1;
        Ok(())
    }
}
