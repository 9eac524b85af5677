//! Error types for bstdb
//!
//! Provides a unified error type for all operations.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using BstError
pub type Result<T> = std::result::Result<T, BstError>;

/// Unified error type for bstdb operations
#[derive(Debug, Error)]
pub enum BstError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Structural Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt header: {0}")]
    CorruptHeader(String),

    #[error("Corrupt record at offset {offset}: {reason}")]
    CorruptRecord { offset: u64, reason: String },

    #[error("Offset {offset} is outside the record region (extent {extent})")]
    OutOfRange { offset: u64, extent: u64 },

    #[error("Tree invariant violated: {0}")]
    InvariantViolation(String),

    // -------------------------------------------------------------------------
    // Encoding Errors
    // -------------------------------------------------------------------------
    #[error("{field} is {len} bytes, record layout allows at most {max}")]
    RecordTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Lock not acquired within {0:?}")]
    LockTimeout(Duration),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BstError {
    /// Shorthand for a record-level corruption error
    pub(crate) fn corrupt_record(offset: u64, reason: impl Into<String>) -> Self {
        BstError::CorruptRecord {
            offset,
            reason: reason.into(),
        }
    }

    /// Attach the record offset to a codec error, which is produced without one
    pub(crate) fn at_offset(self, at: u64) -> Self {
        match self {
            BstError::CorruptRecord { reason, .. } => BstError::CorruptRecord { offset: at, reason },
            other => other,
        }
    }
}
