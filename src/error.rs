//! Error types for the blob staging pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the blob staging pipeline
///
/// Contract violations (releasing a blob twice, touching a buffer after
/// pushing it) are deliberately *not* represented here: they are programming
/// errors caught by debug assertions and the test allocator, not recoverable
/// runtime conditions.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // =========================================================================
    // Blob Errors
    // =========================================================================
    /// Buffer allocation failed
    #[error("allocation of {size} bytes failed: {reason}")]
    AllocationFailed { size: usize, reason: String },

    // =========================================================================
    // Journal Errors
    // =========================================================================
    /// Journal destination is missing or not a directory
    #[error("journal destination does not exist or is not a directory: {0:?}")]
    InvalidDestination(PathBuf),

    /// A journal record failed structural validation
    #[error("corrupt record in {file:?} at offset {offset}: {reason}")]
    CorruptRecord {
        file: PathBuf,
        offset: u64,
        reason: String,
    },

    /// A blob exceeds the record format's 32-bit payload length
    #[error("blob of {size} bytes exceeds the maximum record payload")]
    RecordTooLarge { size: usize },

    /// A journal record's payload does not match its stored checksum
    #[error("checksum mismatch in {file:?} at offset {offset}: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        file: PathBuf,
        offset: u64,
        stored: u32,
        computed: u32,
    },

    // =========================================================================
    // Stage Errors
    // =========================================================================
    /// The consumer thread is no longer running
    #[error("stage consumer already stopped")]
    ConsumerStopped,
}
