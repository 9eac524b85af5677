//! In-order traversal
//!
//! Explicit-stack walk: the stack holds the ancestors still waiting to be
//! yielded, so memory is O(depth) and each node is read exactly once.

use crate::codec::{Node, NodeCodec};
use crate::error::Result;
use crate::storage::{Offset, RecordRead};

use super::{read_node, StepBudget};

/// Ascending iterator over `(key, value)` pairs
///
/// Finite and read-only. Stops after the first error.
pub struct InOrder<S> {
    codec: NodeCodec,
    store: S,
    /// Ancestors whose left subtree is being walked
    stack: Vec<Node>,
    /// Subtree to descend into before popping the stack
    pending: Option<Offset>,
    budget: StepBudget,
    done: bool,
}

impl<S: RecordRead> InOrder<S> {
    pub(super) fn new(codec: NodeCodec, store: S) -> Self {
        let pending = store.header().root;
        let budget = StepBudget::for_store(&store);
        Self {
            codec,
            store,
            stack: Vec::new(),
            pending,
            budget,
            done: false,
        }
    }

    /// Push `pending` and its chain of left children
    fn descend(&mut self) -> Result<()> {
        while let Some(offset) = self.pending.take() {
            self.budget.step()?;
            let node = read_node(&self.codec, &self.store, offset)?;
            self.pending = node.left;
            self.stack.push(node);
        }
        Ok(())
    }
}

impl<S: RecordRead> Iterator for InOrder<S> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Err(e) = self.descend() {
            self.done = true;
            return Some(Err(e));
        }

        match self.stack.pop() {
            Some(node) => {
                self.pending = node.right;
                Some(Ok((node.key, node.value)))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}
