//! Index Record Codec
//!
//! Each WAL segment (`seg-NNNNNN.wal.gz`) has a companion sidecar
//! (`seg-NNNNNN.wal.idx`) holding one fixed-layout record per frame. The
//! sidecar lets the shipper fetch compressed frames by byte range without
//! ever decompressing the segment.
//!
//! ## On-Disk Layout
//!
//! All fields little-endian, 36 bytes per record:
//!
//! ```text
//! ┌───────────┬───────────┬───────────┬─────────────────────┬──────────┬─────────────┐
//! │ frame_seq │ gz_offset │ gz_length │ uncompressed_length │ crc32    │ commit_time │
//! │ (8 bytes) │ (8 bytes) │ (4 bytes) │ (4 bytes)           │ (4 bytes)│ (8 bytes)   │
//! └───────────┴───────────┴───────────┴─────────────────────┴──────────┴─────────────┘
//! ```
//!
//! The file is always a whole multiple of the record size once the producer
//! finishes a write; a trailing partial record means "not yet written" and
//! readers must treat it as end-of-input, not corruption.

/// Size of one index record on disk.
pub const RECORD_SIZE: usize = 36;

/// One frame's entry in the `.wal.idx` sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// Frame sequence number, strictly increasing within a segment from 1.
    pub frame_seq: u64,

    /// Byte offset of the frame in the companion `.wal.gz`.
    pub gz_offset: u64,

    /// Compressed length of the frame.
    pub gz_length: u32,

    /// Uncompressed length of the frame.
    pub uncompressed_length: u32,

    /// CRC32 over the compressed payload.
    pub crc32: u32,

    /// Commit time in unix nanoseconds.
    pub commit_time: i64,
}

impl IndexRecord {
    /// Encode this record into its 36-byte on-disk form.
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[0..8].copy_from_slice(&self.frame_seq.to_le_bytes());
        buf[8..16].copy_from_slice(&self.gz_offset.to_le_bytes());
        buf[16..20].copy_from_slice(&self.gz_length.to_le_bytes());
        buf[20..24].copy_from_slice(&self.uncompressed_length.to_le_bytes());
        buf[24..28].copy_from_slice(&self.crc32.to_le_bytes());
        buf[28..36].copy_from_slice(&self.commit_time.to_le_bytes());
        buf
    }

    /// Decode a record from its 36-byte on-disk form.
    pub fn decode(buf: &[u8; RECORD_SIZE]) -> Self {
        Self {
            frame_seq: u64::from_le_bytes(buf[0..8].try_into().expect("fixed layout")),
            gz_offset: u64::from_le_bytes(buf[8..16].try_into().expect("fixed layout")),
            gz_length: u32::from_le_bytes(buf[16..20].try_into().expect("fixed layout")),
            uncompressed_length: u32::from_le_bytes(buf[20..24].try_into().expect("fixed layout")),
            crc32: u32::from_le_bytes(buf[24..28].try_into().expect("fixed layout")),
            commit_time: i64::from_le_bytes(buf[28..36].try_into().expect("fixed layout")),
        }
    }
}
