//! Property-Based Tests for Journal Framing
//!
//! Uses proptest to verify the record framing invariants across arbitrary
//! payload shapes:
//!
//! 1. **Alignment**: every record footprint is a multiple of the alignment
//! 2. **Roundtrip**: append(payloads) then import yields the same payloads
//! 3. **Truncation safety**: cutting a file anywhere never panics the
//!    importer and never fabricates records

#![cfg(test)]

use std::time::Duration;

use proptest::prelude::*;

use super::format;
use super::{FileAppender, JournalImporter};
use crate::RawBlob;

// =============================================================================
// Property Strategies
// =============================================================================

/// Strategy for payload batches of assorted small sizes, empty included.
fn payload_batch_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 1..16)
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_record_footprint_is_aligned(len in 0usize..100_000) {
        prop_assert_eq!(format::record_len(len) % format::RECORD_ALIGNMENT, 0);
        prop_assert!(format::padding_for(len) < format::RECORD_ALIGNMENT);
    }

    #[test]
    fn prop_header_encodes_length_and_checksum(payload in prop::collection::vec(any::<u8>(), 0..2048)) {
        let header = format::decode_header(&format::encode_header(&payload))
            .expect("header must decode");
        prop_assert_eq!(header.magic, format::MAGIC);
        prop_assert_eq!(header.payload_len as usize, payload.len());
        prop_assert_eq!(header.checksum, crc32fast::hash(&payload));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_append_import_round_trip(payloads in payload_batch_strategy()) {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let mut appender = FileAppender::new(dir.path(), Duration::from_secs(3600))
            .expect("appender failed");

        let mut blobs: Vec<RawBlob> = payloads
            .iter()
            .map(|p| RawBlob::from_slice(p).expect("alloc failed"))
            .collect();
        appender.append(&blobs).expect("append failed");
        for blob in &mut blobs {
            blob.release();
        }

        let (read_back, stats) = JournalImporter::new(true)
            .import_all(dir.path())
            .expect("import failed");
        prop_assert_eq!(stats.records as usize, payloads.len());
        prop_assert_eq!(stats.checksum_failures, 0);
        prop_assert_eq!(read_back.len(), payloads.len());
        for (read, written) in read_back.iter().zip(&payloads) {
            prop_assert_eq!(&read[..], &written[..]);
        }
    }

    #[test]
    fn prop_truncation_never_fabricates_records(
        payloads in payload_batch_strategy(),
        cut in 0usize..4096,
    ) {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let mut appender = FileAppender::new(dir.path(), Duration::from_secs(3600))
            .expect("appender failed");

        let mut blobs: Vec<RawBlob> = payloads
            .iter()
            .map(|p| RawBlob::from_slice(p).expect("alloc failed"))
            .collect();
        appender.append(&blobs).expect("append failed");
        for blob in &mut blobs {
            blob.release();
        }

        let file = appender.current_path().expect("no journal file").to_owned();
        let contents = std::fs::read(&file).expect("read failed");
        let keep = contents.len().saturating_sub(cut);
        std::fs::write(&file, &contents[..keep]).expect("write failed");

        let (read_back, stats) = JournalImporter::new(true)
            .import_all(dir.path())
            .expect("import failed");
        prop_assert!(stats.records as usize <= payloads.len());
        prop_assert_eq!(read_back.len(), stats.records as usize);
        for (read, written) in read_back.iter().zip(&payloads) {
            prop_assert_eq!(&read[..], &written[..]);
        }
    }
}
