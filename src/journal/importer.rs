//! Journal file reader

use std::fs::File;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use memmap2::Mmap;
use tracing::{debug, warn};

use super::format;
use crate::error::{Error, Result};

/// Counters describing one import pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportStats {
    /// Journal files visited (matching the `output-<seconds>` name pattern)
    pub files: u64,
    /// Records successfully delivered to the handler
    pub records: u64,
    /// Payload bytes delivered
    pub bytes: u64,
    /// Records skipped because their checksum did not match
    pub checksum_failures: u64,
    /// Files abandoned early due to a bad magic marker or truncated record
    pub corrupt_files: u64,
}

/// Reads framed blob records back out of a journal directory.
///
/// Files are visited in the order of the timestamp embedded in their names,
/// so payloads come back in the order batches were rotated. Each file is
/// memory-mapped and scanned sequentially; a record that fails validation
/// ends that file's scan (everything after it is unreachable without a valid
/// length), while a checksum mismatch skips only the damaged record.
pub struct JournalImporter {
    verify_checksums: bool,
}

impl JournalImporter {
    pub fn new(verify_checksums: bool) -> Self {
        Self { verify_checksums }
    }

    /// Scans `source` recursively and feeds every valid payload to
    /// `handler`, oldest file first.
    pub fn import<F>(&self, source: &Path, mut handler: F) -> Result<ImportStats>
    where
        F: FnMut(&[u8]),
    {
        let mut files = Vec::new();
        collect_journal_files(source, &mut files)?;
        files.sort();

        let mut stats = ImportStats::default();
        for (timestamp, path) in files {
            debug!(file = %path.display(), timestamp, "importing journal file");
            stats.files += 1;
            self.import_file(&path, &mut handler, &mut stats)?;
        }
        Ok(stats)
    }

    /// Convenience wrapper collecting every payload into owned buffers.
    pub fn import_all(&self, source: &Path) -> Result<(Vec<Bytes>, ImportStats)> {
        let mut payloads = Vec::new();
        let stats = self.import(source, |payload| {
            payloads.push(Bytes::copy_from_slice(payload));
        })?;
        Ok((payloads, stats))
    }

    fn import_file<F>(&self, path: &Path, handler: &mut F, stats: &mut ImportStats) -> Result<()>
    where
        F: FnMut(&[u8]),
    {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(());
        }

        // SAFETY: the mapping is read-only and journal files are append-only;
        // nothing truncates them while an import runs.
        let map = unsafe { Mmap::map(&file)? };
        let data: &[u8] = &map;

        let mut offset = 0usize;
        while let Some(header) = format::decode_header(&data[offset..]) {
            if header.magic != format::MAGIC {
                warn!(
                    file = %path.display(),
                    offset,
                    "bad record marker, abandoning rest of file"
                );
                stats.corrupt_files += 1;
                return Ok(());
            }

            let payload_len = header.payload_len as usize;
            let payload_start = offset + format::HEADER_SIZE;
            let Some(payload_end) = payload_start.checked_add(payload_len) else {
                stats.corrupt_files += 1;
                return Ok(());
            };
            if payload_end > data.len() {
                warn!(
                    file = %path.display(),
                    offset,
                    payload_len,
                    "truncated record, abandoning rest of file"
                );
                stats.corrupt_files += 1;
                return Ok(());
            }

            let payload = &data[payload_start..payload_end];
            if self.verify_checksums {
                let computed = crc32fast::hash(payload);
                if computed != header.checksum {
                    warn!(
                        file = %path.display(),
                        offset,
                        stored = header.checksum,
                        computed,
                        "checksum mismatch, skipping record"
                    );
                    stats.checksum_failures += 1;
                } else {
                    handler(payload);
                    stats.records += 1;
                    stats.bytes += payload_len as u64;
                }
            } else {
                handler(payload);
                stats.records += 1;
                stats.bytes += payload_len as u64;
            }

            offset = payload_end + format::padding_for(payload_len);
            if offset >= data.len() {
                break;
            }
        }
        Ok(())
    }
}

/// Recursively gathers `(timestamp, path)` pairs for files matching the
/// journal naming scheme; anything else is ignored with a warning.
fn collect_journal_files(path: &Path, into: &mut Vec<(u64, PathBuf)>) -> Result<()> {
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            collect_journal_files(&entry?.path(), into)?;
        }
        return Ok(());
    }

    match parse_journal_timestamp(path) {
        Some(timestamp) => into.push((timestamp, path.to_path_buf())),
        None => warn!(file = %path.display(), "ignoring non-journal file"),
    }
    Ok(())
}

/// Extracts `<seconds>` from an `output-<seconds>` file name.
fn parse_journal_timestamp(path: &Path) -> Option<u64> {
    path.file_name()?
        .to_str()?
        .strip_prefix("output-")?
        .parse()
        .ok()
}

/// Validation helper used by tooling: returns an error describing the first
/// defect found in a single journal file, if any.
pub fn check_file(path: &Path) -> Result<u64> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(0);
    }
    // SAFETY: read-only mapping of an append-only file.
    let map = unsafe { Mmap::map(&file)? };
    let data: &[u8] = &map;

    let mut records = 0u64;
    let mut offset = 0usize;
    while let Some(header) = format::decode_header(&data[offset..]) {
        if header.magic != format::MAGIC {
            return Err(Error::CorruptRecord {
                file: path.to_path_buf(),
                offset: offset as u64,
                reason: "bad record marker".into(),
            });
        }
        let payload_len = header.payload_len as usize;
        let payload_start = offset + format::HEADER_SIZE;
        let payload_end = payload_start.checked_add(payload_len).ok_or_else(|| {
            Error::CorruptRecord {
                file: path.to_path_buf(),
                offset: offset as u64,
                reason: "payload length overflow".into(),
            }
        })?;
        if payload_end > data.len() {
            return Err(Error::CorruptRecord {
                file: path.to_path_buf(),
                offset: offset as u64,
                reason: format!("record extends {} bytes past end of file", payload_end - data.len()),
            });
        }

        let payload = &data[payload_start..payload_end];
        let computed = crc32fast::hash(payload);
        if computed != header.checksum {
            return Err(Error::ChecksumMismatch {
                file: path.to_path_buf(),
                offset: offset as u64,
                stored: header.checksum,
                computed,
            });
        }

        records += 1;
        offset = payload_end + format::padding_for(payload_len);
        if offset >= data.len() {
            break;
        }
    }
    Ok(records)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::super::FileAppender;
    use super::*;
    use crate::RawBlob;

    fn write_payloads(dir: &Path, payloads: &[&[u8]]) {
        let mut appender =
            FileAppender::new(dir, Duration::from_secs(3600)).expect("appender failed");
        let mut blobs: Vec<RawBlob> = payloads
            .iter()
            .map(|p| RawBlob::from_slice(p).expect("alloc failed"))
            .collect();
        appender.append(&blobs).expect("append failed");
        for blob in &mut blobs {
            blob.release();
        }
    }

    #[test]
    fn test_round_trip_preserves_payloads_in_order() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        write_payloads(dir.path(), &[b"first", b"second record", b""]);

        let importer = JournalImporter::new(true);
        let (payloads, stats) = importer.import_all(dir.path()).expect("import failed");

        assert_eq!(stats.files, 1);
        assert_eq!(stats.records, 3);
        assert_eq!(stats.checksum_failures, 0);
        assert_eq!(payloads.len(), 3);
        assert_eq!(&payloads[0][..], b"first");
        assert_eq!(&payloads[1][..], b"second record");
        assert!(payloads[2].is_empty());
    }

    #[test]
    fn test_corrupted_payload_is_skipped_with_checksums_on() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        write_payloads(dir.path(), &[b"will be damaged", b"stays intact"]);

        // Flip one payload byte of the first record.
        let file = std::fs::read_dir(dir.path())
            .expect("read_dir failed")
            .next()
            .expect("no journal file")
            .expect("dir entry failed")
            .path();
        let mut contents = std::fs::read(&file).expect("read failed");
        contents[format::HEADER_SIZE] ^= 0xFF;
        std::fs::write(&file, contents).expect("write failed");

        let importer = JournalImporter::new(true);
        let (payloads, stats) = importer.import_all(dir.path()).expect("import failed");
        assert_eq!(stats.checksum_failures, 1);
        assert_eq!(stats.records, 1);
        assert_eq!(&payloads[0][..], b"stays intact");

        // Without verification the damaged payload comes through as-is.
        let lax = JournalImporter::new(false);
        let (payloads, stats) = lax.import_all(dir.path()).expect("import failed");
        assert_eq!(stats.records, 2);
        assert_eq!(stats.checksum_failures, 0);
        assert_eq!(payloads.len(), 2);
    }

    #[test]
    fn test_truncated_tail_abandons_the_file() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        write_payloads(dir.path(), &[b"complete", b"this one gets cut"]);

        let file = std::fs::read_dir(dir.path())
            .expect("read_dir failed")
            .next()
            .expect("no journal file")
            .expect("dir entry failed")
            .path();
        // Cut into the second record's payload, past its trailing padding.
        let contents = std::fs::read(&file).expect("read failed");
        std::fs::write(&file, &contents[..contents.len() - 12]).expect("write failed");

        let importer = JournalImporter::new(true);
        let (payloads, stats) = importer.import_all(dir.path()).expect("import failed");
        assert_eq!(stats.records, 1);
        assert_eq!(stats.corrupt_files, 1);
        assert_eq!(&payloads[0][..], b"complete");
    }

    #[test]
    fn test_files_import_in_timestamp_order() {
        let dir = tempfile::tempdir().expect("tempdir failed");

        // Hand-build two journal files with out-of-order directory names.
        for (name, payload) in [("output-2000", b"newer".as_slice()), ("output-1000", b"older")] {
            let mut record = Vec::new();
            record.extend_from_slice(&format::encode_header(payload));
            record.extend_from_slice(payload);
            record.extend_from_slice(&vec![0u8; format::padding_for(payload.len())]);
            std::fs::write(dir.path().join(name), record).expect("write failed");
        }

        let importer = JournalImporter::new(true);
        let (payloads, stats) = importer.import_all(dir.path()).expect("import failed");
        assert_eq!(stats.files, 2);
        assert_eq!(&payloads[0][..], b"older");
        assert_eq!(&payloads[1][..], b"newer");
    }

    #[test]
    fn test_non_journal_files_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        std::fs::write(dir.path().join("README"), b"not a journal").expect("write failed");
        write_payloads(dir.path(), &[b"payload"]);

        let importer = JournalImporter::new(true);
        let (payloads, stats) = importer.import_all(dir.path()).expect("import failed");
        assert_eq!(stats.files, 1);
        assert_eq!(payloads.len(), 1);
    }

    #[test]
    fn test_check_file_reports_first_defect() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        write_payloads(dir.path(), &[b"abc", b"def"]);

        let file = std::fs::read_dir(dir.path())
            .expect("read_dir failed")
            .next()
            .expect("no journal file")
            .expect("dir entry failed")
            .path();
        assert_eq!(check_file(&file).expect("check failed"), 2);

        let mut contents = std::fs::read(&file).expect("read failed");
        contents[format::HEADER_SIZE] ^= 0x01;
        std::fs::write(&file, contents).expect("write failed");
        assert_matches!(check_file(&file), Err(Error::ChecksumMismatch { .. }));
    }
}
