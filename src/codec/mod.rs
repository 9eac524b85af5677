//! Node Codec Module
//!
//! Converts tree nodes to and from fixed-size records. Pure transformation:
//! no I/O, no file handle.
//!
//! ## Record Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Tag (1)     0x01 live | 0x02 deleted | 0x03 free            │
//! │ KeyLen u16 (2) | ValLen u16 (2)                             │
//! │ Left u64 (8) | Right u64 (8)      (0 = no child)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Key bytes, zero-padded to max_key_len                       │
//! │ Value bytes, zero-padded to max_value_len                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │ CRC32 of everything above (4)                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A free record carries the next free-list entry in its Left field and no
//! payload. All integers are little-endian.

mod node;
mod record;

pub use node::{Node, Record, RecordTag, Side};
pub use record::{NodeCodec, RECORD_OVERHEAD};
