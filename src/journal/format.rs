//! On-disk record framing
//!
//! Each blob is persisted as one self-delimiting record:
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────┬─────────┬──────────┐
//! │ magic (u64)  │ length (u32) │ crc32 (u32)  │ payload │ padding  │
//! └──────────────┴──────────────┴──────────────┴─────────┴──────────┘
//! ```
//!
//! All header fields are little-endian. Records are padded with zeros to an
//! 8-byte boundary so a reader can scan a file with aligned loads. Payload
//! bytes are opaque - the journal neither interprets nor transforms them.

/// Marker prefixing every record.
pub const MAGIC: u64 = u64::MAX;

/// Bytes of header preceding each payload: magic + length + checksum.
pub const HEADER_SIZE: usize = 8 + 4 + 4;

/// Records start on multiples of this many bytes.
pub const RECORD_ALIGNMENT: usize = 8;

/// Largest payload the length field can describe.
pub const MAX_PAYLOAD: usize = u32::MAX as usize;

/// Zero padding bytes appended after a payload.
pub fn padding_for(payload_len: usize) -> usize {
    (RECORD_ALIGNMENT - payload_len % RECORD_ALIGNMENT) % RECORD_ALIGNMENT
}

/// Total on-disk footprint of a record holding `payload_len` bytes.
pub fn record_len(payload_len: usize) -> usize {
    HEADER_SIZE + payload_len + padding_for(payload_len)
}

/// Builds the header for `payload`, computing its CRC32.
pub fn encode_header(payload: &[u8]) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[0..8].copy_from_slice(&MAGIC.to_le_bytes());
    header[8..12].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    header[12..16].copy_from_slice(&crc32fast::hash(payload).to_le_bytes());
    header
}

/// Header fields of a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub magic: u64,
    pub payload_len: u32,
    pub checksum: u32,
}

/// Reads the header starting at `bytes[0]`; `None` when fewer than
/// [`HEADER_SIZE`] bytes remain.
pub fn decode_header(bytes: &[u8]) -> Option<RecordHeader> {
    if bytes.len() < HEADER_SIZE {
        return None;
    }
    Some(RecordHeader {
        magic: u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
        payload_len: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
        checksum: u32::from_le_bytes(bytes[12..16].try_into().unwrap()),
    })
}
