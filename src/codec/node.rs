//! Node definitions
//!
//! The logical values the codec moves on and off disk.

use crate::storage::Offset;

/// Record discriminator stored in the first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordTag {
    Live = 0x01,
    Deleted = 0x02,
    Free = 0x03,
}

impl RecordTag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(RecordTag::Live),
            0x02 => Some(RecordTag::Deleted),
            0x03 => Some(RecordTag::Free),
            _ => None,
        }
    }
}

/// Which child pointer of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// A BST node as stored in one record
///
/// Identity is the record offset, not the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub left: Option<Offset>,
    pub right: Option<Offset>,
    /// Tombstone: logically removed, bytes retained
    pub deleted: bool,
}

impl Node {
    /// A live leaf
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            left: None,
            right: None,
            deleted: false,
        }
    }

    pub fn child(&self, side: Side) -> Option<Offset> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn set_child(&mut self, side: Side, child: Option<Offset>) {
        match side {
            Side::Left => self.left = child,
            Side::Right => self.right = child,
        }
    }
}

/// Anything a record slot can hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A live or tombstoned node
    Node(Node),

    /// An unused slot on the free list
    Free { next: Option<Offset> },
}
