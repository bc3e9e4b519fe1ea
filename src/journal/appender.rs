//! Append-only journal file writer

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use super::format;
use crate::error::{Error, Result};
use crate::RawBlob;

/// Zero bytes used to pad records to the alignment boundary.
const PADDING: [u8; format::RECORD_ALIGNMENT] = [0; format::RECORD_ALIGNMENT];

/// Appends framed blob records to rotating files in a destination folder.
///
/// Files are named `output-<unix-seconds>`; a new file starts whenever the
/// rotation interval has elapsed since the current one was opened. The
/// appender only ever appends - it never rewrites or truncates, so a crash
/// at worst truncates the final record, which the importer detects.
///
/// The appender reads blob contents but takes no part in their ownership:
/// the caller releases every blob after `append` returns, success or not.
#[derive(Debug)]
pub struct FileAppender {
    destination: PathBuf,
    rotate_every: Duration,
    writer: Option<BufWriter<File>>,
    current_path: PathBuf,
    opened_at: u64,
}

impl FileAppender {
    /// Creates an appender writing into `destination`.
    ///
    /// Fails with [`Error::InvalidDestination`] when the folder does not
    /// exist - the appender never creates directories on its own.
    pub fn new(destination: impl Into<PathBuf>, rotate_every: Duration) -> Result<Self> {
        let destination = destination.into();
        if !destination.is_dir() {
            return Err(Error::InvalidDestination(destination));
        }
        Ok(Self {
            destination,
            rotate_every,
            writer: None,
            current_path: PathBuf::new(),
            opened_at: 0,
        })
    }

    /// Appends one record per blob to the current journal file.
    ///
    /// Blobs must be live; their ownership stays with the caller. The batch
    /// is flushed before returning so a consumed blob is on disk (modulo OS
    /// caching) by the time it is released.
    pub fn append(&mut self, blobs: &[RawBlob]) -> Result<()> {
        if blobs.is_empty() {
            return Ok(());
        }

        for blob in blobs {
            if blob.len() > format::MAX_PAYLOAD {
                return Err(Error::RecordTooLarge { size: blob.len() });
            }
        }

        self.rotate_if_needed()?;
        let writer = self.writer.as_mut().expect("rotate_if_needed opens a file");

        for blob in blobs {
            let payload = blob.as_slice();
            writer.write_all(&format::encode_header(payload))?;
            writer.write_all(payload)?;
            writer.write_all(&PADDING[..format::padding_for(payload.len())])?;
        }
        writer.flush()?;

        debug!(blobs = blobs.len(), file = %self.current_path.display(), "appended batch");
        Ok(())
    }

    /// Path of the file currently being written, if any batch has landed yet.
    pub fn current_path(&self) -> Option<&Path> {
        self.writer.as_ref().map(|_| self.current_path.as_path())
    }

    fn rotate_if_needed(&mut self) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        if self.writer.is_some() && now < self.opened_at + self.rotate_every.as_secs() {
            return Ok(());
        }

        let path = self.destination.join(format!("output-{now}"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(file = %path.display(), "journal file rotated");

        self.writer = Some(BufWriter::new(file));
        self.current_path = path;
        self.opened_at = now;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
