//! Frame Data Structure
//!
//! A frame is the fundamental unit shipped by walship: one opaque compressed
//! payload within a segment, described by one index record. The shipper never
//! decompresses or interprets the payload; it moves bytes.
//!
//! Payloads use `bytes::Bytes` so batching and sending never copy the data.

use bytes::Bytes;

/// A single frame read from a WAL segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Name of the segment this frame came from (e.g. `seg-000001.wal.gz`).
    pub segment_id: String,

    /// Sequence number within the segment, starting at 1.
    pub frame_seq: u64,

    /// Compressed payload, opaque to the shipper.
    pub payload: Bytes,

    /// Uncompressed length as recorded in the index.
    pub uncompressed_length: u32,

    /// Commit time in unix nanoseconds.
    pub commit_time: i64,
}

impl Frame {
    pub fn new(
        segment_id: impl Into<String>,
        frame_seq: u64,
        payload: Bytes,
        uncompressed_length: u32,
        commit_time: i64,
    ) -> Self {
        Self {
            segment_id: segment_id.into(),
            frame_seq,
            payload,
            uncompressed_length,
            commit_time,
        }
    }

    /// Compressed size of this frame in bytes. Batch accounting uses this.
    pub fn compressed_size(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_fields() {
        let frame = Frame::new("seg-000001.wal.gz", 3, Bytes::from("abc"), 9, 1_700_000_000);
        assert_eq!(frame.segment_id, "seg-000001.wal.gz");
        assert_eq!(frame.frame_seq, 3);
        assert_eq!(frame.payload, Bytes::from("abc"));
        assert_eq!(frame.uncompressed_length, 9);
        assert_eq!(frame.commit_time, 1_700_000_000);
    }

    #[test]
    fn test_compressed_size() {
        let frame = Frame::new("s", 1, Bytes::from(vec![0u8; 1024]), 4096, 0);
        assert_eq!(frame.compressed_size(), 1024);
    }

    #[test]
    fn test_empty_payload() {
        let frame = Frame::new("s", 1, Bytes::new(), 0, 0);
        assert_eq!(frame.compressed_size(), 0);
    }

    #[test]
    fn test_clone_is_cheap_and_equal() {
        let frame = Frame::new("s", 1, Bytes::from("payload"), 7, 1);
        let cloned = frame.clone();
        assert_eq!(frame, cloned);
    }
}
