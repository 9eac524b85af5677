//! BST operations over offset-addressed nodes

use std::cmp::Ordering;

use crate::codec::{Node, NodeCodec, Side};
use crate::error::Result;
use crate::storage::{ExclusiveGuard, Offset, RecordRead};

use super::iterator::InOrder;
use super::{read_node, StepBudget};

/// Tree operations
///
/// Holds no node state: every call resolves nodes through the guard it is
/// given, starting from the root recorded in that guard's header.
#[derive(Debug, Clone, Copy)]
pub struct TreeEngine {
    pub(super) codec: NodeCodec,
    pub(super) reclaim_space: bool,
}

/// A node's parent and which of its pointers leads to the node
struct Link {
    offset: Offset,
    node: Node,
    side: Side,
}

/// Outcome of descending towards a key
enum Position {
    /// The key is stored at `offset`
    Found {
        parent: Option<Link>,
        offset: Offset,
        node: Node,
    },

    /// The key is absent; a new node would hang off `parent` (root if `None`)
    Vacant { parent: Option<Link> },
}

impl TreeEngine {
    pub fn new(codec: NodeCodec, reclaim_space: bool) -> Self {
        Self {
            codec,
            reclaim_space,
        }
    }

    pub fn codec(&self) -> &NodeCodec {
        &self.codec
    }

    /// Look up `key`: O(depth) record reads
    pub fn search<S: RecordRead + ?Sized>(&self, store: &S, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut budget = StepBudget::for_store(store);
        let mut cursor = store.header().root;

        while let Some(offset) = cursor {
            budget.step()?;
            let node = read_node(&self.codec, store, offset)?;
            cursor = match key.cmp(node.key.as_slice()) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Ok(Some(node.value)),
            };
        }

        Ok(None)
    }

    /// Insert or overwrite `key`
    ///
    /// Existing key: the value is rewritten in place (one record write).
    /// New key: the node record is placed first, then linked from its parent
    /// (or the header root). Flushed before returning.
    pub fn insert(&self, guard: &mut ExclusiveGuard<'_>, key: &[u8], value: &[u8]) -> Result<()> {
        self.codec.check_fits(key, value)?;

        match self.locate(&*guard, key)? {
            Position::Found {
                offset, mut node, ..
            } => {
                tracing::trace!("Overwriting value at {}", offset);
                node.value = value.to_vec();
                let bytes = self.codec.encode(&node)?;
                guard.write_record(offset, &bytes)?;
            }
            Position::Vacant { parent } => {
                let bytes = self.codec.encode(&Node::new(key, value))?;
                let offset = self.allocate(guard, &bytes)?;
                tracing::trace!("New node at {}", offset);
                self.link(guard, parent, Some(offset))?;
            }
        }

        guard.flush()
    }

    /// Remove `key`; `false` if it was absent
    ///
    /// Zero or one child: the parent pointer is redirected to the sole child.
    /// Two children: the in-order successor's payload is copied up into the
    /// target record, then the successor (which has no left child) is spliced
    /// out of its own position. Node identity never moves, so only the
    /// successor's parent pointer changes.
    pub fn delete(&self, guard: &mut ExclusiveGuard<'_>, key: &[u8]) -> Result<bool> {
        let Position::Found {
            parent,
            offset,
            mut node,
        } = self.locate(&*guard, key)?
        else {
            return Ok(false);
        };

        let right = match (node.left, node.right) {
            (Some(_), Some(right)) => right,
            (left, right) => {
                tracing::trace!("Splicing out {}", offset);
                self.link(guard, parent, left.or(right))?;
                self.release(guard, offset, node)?;
                guard.flush()?;
                return Ok(true);
            }
        };

        // Two children: the successor is the leftmost node of the right subtree
        let mut budget = StepBudget::for_store(&*guard);
        let mut successor_parent: Option<Link> = None;
        let mut successor_offset = right;
        let mut successor = read_node(&self.codec, &*guard, successor_offset)?;
        while let Some(left) = successor.left {
            budget.step()?;
            let next = read_node(&self.codec, &*guard, left)?;
            successor_parent = Some(Link {
                offset: successor_offset,
                node: successor,
                side: Side::Left,
            });
            successor_offset = left;
            successor = next;
        }

        tracing::trace!("Copying successor {} up into {}", successor_offset, offset);
        node.key = successor.key.clone();
        node.value = successor.value.clone();

        match successor_parent {
            None => {
                // Successor is the target's right child: copy-up and splice in one write
                node.right = successor.right;
                let bytes = self.codec.encode(&node)?;
                guard.write_record(offset, &bytes)?;
            }
            Some(link) => {
                let bytes = self.codec.encode(&node)?;
                guard.write_record(offset, &bytes)?;
                self.link(guard, Some(link), successor.right)?;
            }
        }
        self.release(guard, successor_offset, successor)?;

        guard.flush()?;
        Ok(true)
    }

    /// Lazy ascending walk over `(key, value)` pairs
    ///
    /// The iterator owns `store`; pass a guard to hold its lock for the whole
    /// walk, or a reference to borrow one.
    pub fn in_order<S: RecordRead>(&self, store: S) -> InOrder<S> {
        InOrder::new(self.codec, store)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Descend from the root towards `key`, remembering the last link taken
    fn locate<S: RecordRead + ?Sized>(&self, store: &S, key: &[u8]) -> Result<Position> {
        let mut budget = StepBudget::for_store(store);
        let mut parent: Option<Link> = None;
        let mut cursor = store.header().root;

        while let Some(offset) = cursor {
            budget.step()?;
            let node = read_node(&self.codec, store, offset)?;
            let side = match key.cmp(node.key.as_slice()) {
                Ordering::Less => Side::Left,
                Ordering::Greater => Side::Right,
                Ordering::Equal => {
                    return Ok(Position::Found {
                        parent,
                        offset,
                        node,
                    })
                }
            };
            cursor = node.child(side);
            parent = Some(Link { offset, node, side });
        }

        Ok(Position::Vacant { parent })
    }

    /// Point `parent`'s link (or the header root) at `child`
    ///
    /// This is the single commit write of every structural change.
    fn link(
        &self,
        guard: &mut ExclusiveGuard<'_>,
        parent: Option<Link>,
        child: Option<Offset>,
    ) -> Result<()> {
        match parent {
            None => {
                let mut header = *guard.header();
                header.root = child;
                guard.write_header(header)
            }
            Some(Link {
                offset,
                mut node,
                side,
            }) => {
                node.set_child(side, child);
                let bytes = self.codec.encode(&node)?;
                guard.write_record(offset, &bytes)
            }
        }
    }
}
