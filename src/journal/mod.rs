//! Rotating append-only blob journal
//!
//! The journal is the disk-facing end of the pipeline: blobs popped from the
//! transit queue are framed (magic, length, CRC32, padding) and appended to
//! time-rotated files, and an importer reads them back with the same framing
//! rules. Payload bytes are treated as opaque throughout - what they encode
//! is some other layer's business.
//!
//! - [`format`] - record framing constants and header codec
//! - [`FileAppender`] - writes framed records to `output-<seconds>` files
//! - [`JournalImporter`] - scans a journal directory back into payloads
//! - [`JournalSink`] - plugs the appender into a
//!   [`StageConsumer`](crate::stage::StageConsumer)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::stage::BlobSink;
use crate::RawBlob;

pub mod format;

mod appender;
mod importer;

#[cfg(test)]
mod proptest;

pub use appender::FileAppender;
pub use importer::{check_file, ImportStats, JournalImporter};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the journal writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Folder receiving journal files (must already exist)
    pub destination: PathBuf,

    /// How often a fresh journal file is started
    pub rotate_every: Duration,
}

impl JournalConfig {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            rotate_every: Duration::from_secs(3600),
        }
    }
}

// =============================================================================
// Sink
// =============================================================================

/// [`BlobSink`] that persists every consumed blob to the journal.
pub struct JournalSink {
    appender: FileAppender,
}

impl JournalSink {
    pub fn new(config: &JournalConfig) -> Result<Self> {
        Ok(Self {
            appender: FileAppender::new(config.destination.clone(), config.rotate_every)?,
        })
    }
}

impl BlobSink for JournalSink {
    fn consume(&mut self, blobs: &[RawBlob]) -> Result<()> {
        self.appender.append(blobs)
    }

    fn on_finish(&mut self) {
        debug!("journal sink finished");
    }
}
