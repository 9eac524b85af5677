//! # bstdb
//!
//! A single-file key-value store indexed by a binary search tree that lives
//! entirely on disk:
//! - Nodes are fixed-size, checksummed records that point at each other by
//!   file offset
//! - Every mutation is flushed before it returns
//! - Single-writer/multi-reader locking, in-process and across processes
//! - Ordered, lazy scans
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Database                             │
//! │          get / put / delete / scan / verify                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  shared / exclusive guard
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Tree Engine                            │
//! │       search, insert, delete, in-order walk by offset       │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ Node ⇄ bytes                     │ bytes @ offset
//!            ▼                                  ▼
//!   ┌─────────────────┐               ┌──────────────────┐
//!   │   Node Codec    │               │ Storage Manager  │
//!   │ (pure, no I/O)  │               │ (file + locks)   │
//!   └─────────────────┘               └──────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use bstdb::{Config, Database};
//!
//! # fn main() -> bstdb::Result<()> {
//! let db = Database::open(Config::builder().path("data.db").build())?;
//! db.put(b"b", b"1")?;
//! db.put(b"a", b"2")?;
//! for entry in db.scan()? {
//!     let (key, value) = entry?;
//!     println!("{:?} = {:?}", key, value);
//! }
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod codec;
pub mod tree;
pub mod database;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BstError, Result};
pub use config::{Config, SyncStrategy};
pub use database::{Database, Scan};
pub use tree::TreeStats;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of bstdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
