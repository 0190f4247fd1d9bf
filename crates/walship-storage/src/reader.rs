//! Segment Index Reader
//!
//! `WalReader` walks the WAL root one frame at a time. It decodes 36-byte
//! index records from the `.wal.idx` sidecar and fetches each frame's
//! compressed bytes from the companion `.wal.gz` by byte range, never
//! decompressing anything.
//!
//! ## End-of-Input Semantics
//!
//! The producer appends concurrently, so "no more data" is a normal,
//! recoverable condition, not an error:
//!
//! - Fewer than 36 bytes left in the index → the tail record is still being
//!   written; report end-of-input and retry later.
//! - Index exhausted AND a lexicographically later segment exists → the
//!   producer has moved on; close the current handles and advance.
//! - Index exhausted and no later segment → report end-of-input; the caller
//!   polls.
//!
//! ## Restart Semantics
//!
//! A reader seeded with a cursor reopens `idx_path` at `idx_offset`, so the
//! next record read is the first unsent frame. If the cursor's segment was
//! cleaned up in the meantime, the reader skips forward to the first segment
//! whose name sorts after `last_file`, starting at offset 0.
//!
//! The reader owns open file handles for the current segment only and is
//! driven from a single task.

use std::io::SeekFrom;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};
use walship_core::{Cursor, Error, Frame, IndexRecord, Result, RECORD_SIZE};

use crate::segments;

/// Sequential reader over the segments of one WAL root.
pub struct WalReader {
    wal_dir: PathBuf,
    verify: bool,

    /// Name of the newest segment known to be fully consumed (or behind the
    /// seeded cursor). Empty before the first segment is opened.
    last_file: String,

    current: Option<OpenSegment>,
}

struct OpenSegment {
    file_name: String,
    idx_path: PathBuf,
    gz_path: PathBuf,
    idx: File,
    gz: File,
    idx_offset: u64,
}

impl WalReader {
    /// Open a reader over `wal_dir`, optionally resuming from a cursor.
    ///
    /// With `verify` enabled, every frame's crc32 is checked against its
    /// index record (debug aid; costs one pass over each payload).
    pub async fn open(
        wal_dir: impl Into<PathBuf>,
        cursor: Option<&Cursor>,
        verify: bool,
    ) -> Result<Self> {
        let mut reader = Self {
            wal_dir: wal_dir.into(),
            verify,
            last_file: String::new(),
            current: None,
        };
        if let Some(cursor) = cursor {
            reader.last_file = cursor.last_file.clone();
            match open_cursor_segment(cursor).await? {
                Some(seg) => {
                    debug!(
                        segment = %cursor.cur_gz,
                        idx_offset = cursor.idx_offset,
                        "resuming from cursor"
                    );
                    reader.current = Some(seg);
                }
                None => {
                    // Segment cleaned up behind us; skip to the next one.
                    warn!(
                        idx_path = %cursor.idx_path.display(),
                        last_file = %cursor.last_file,
                        "cursor segment vanished, skipping forward"
                    );
                }
            }
        }
        Ok(reader)
    }

    /// Read the next frame, together with the cursor describing the
    /// position immediately after it.
    ///
    /// Returns `Ok(None)` when no frame is currently available; the caller
    /// is expected to poll again after its idle interval.
    pub async fn next_frame(&mut self) -> Result<Option<(Frame, Cursor)>> {
        loop {
            if self.current.is_none() {
                match self.open_next().await? {
                    Some(seg) => self.current = Some(seg),
                    None => return Ok(None),
                }
            }
            let verify = self.verify;
            let Some(seg) = self.current.as_mut() else {
                continue;
            };

            match read_frame(seg, verify).await? {
                Some(pair) => return Ok(Some(pair)),
                None => {
                    // Index exhausted. Advance only once the producer has
                    // started a newer segment; until then it may still
                    // append to this one.
                    let exhausted = seg.file_name.clone();
                    let entries = segments::list_segments(&self.wal_dir).await?;
                    if segments::next_after(&entries, &exhausted).is_some() {
                        debug!(segment = %exhausted, "segment exhausted, advancing");
                        self.last_file = exhausted;
                        self.current = None;
                    } else {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Name of the segment the reader is currently positioned in, if any.
    pub fn current_segment(&self) -> Option<&str> {
        self.current.as_ref().map(|seg| seg.file_name.as_str())
    }

    async fn open_next(&mut self) -> Result<Option<OpenSegment>> {
        let entries = segments::list_segments(&self.wal_dir).await?;
        let Some(entry) = segments::next_after(&entries, &self.last_file) else {
            return Ok(None);
        };
        let idx = File::open(&entry.idx_path).await?;
        let gz = File::open(&entry.gz_path).await?;
        debug!(segment = %entry.file_name, "opened segment");
        Ok(Some(OpenSegment {
            file_name: entry.file_name.clone(),
            idx_path: entry.idx_path.clone(),
            gz_path: entry.gz_path.clone(),
            idx,
            gz,
            idx_offset: 0,
        }))
    }
}

/// Reopen the cursor's segment at its recorded offset. `None` when either
/// file has been cleaned up by an external collaborator.
async fn open_cursor_segment(cursor: &Cursor) -> Result<Option<OpenSegment>> {
    let mut idx = match File::open(&cursor.idx_path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let gz_path = cursor.idx_path.with_file_name(&cursor.cur_gz);
    let gz = match File::open(&gz_path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    idx.seek(SeekFrom::Start(cursor.idx_offset)).await?;
    Ok(Some(OpenSegment {
        file_name: cursor.cur_gz.clone(),
        idx_path: cursor.idx_path.clone(),
        gz_path,
        idx,
        gz,
        idx_offset: cursor.idx_offset,
    }))
}

async fn read_frame(seg: &mut OpenSegment, verify: bool) -> Result<Option<(Frame, Cursor)>> {
    // Re-seek on every read so a partial tail record observed on the last
    // pass is re-read in full once the producer finishes it.
    seg.idx.seek(SeekFrom::Start(seg.idx_offset)).await?;
    let mut buf = [0u8; RECORD_SIZE];
    match seg.idx.read_exact(&mut buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let record = IndexRecord::decode(&buf);

    seg.gz.seek(SeekFrom::Start(record.gz_offset)).await?;
    let mut payload = vec![0u8; record.gz_length as usize];
    match seg.gz.read_exact(&mut payload).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(Error::ShortRead {
                path: seg.gz_path.clone(),
                offset: record.gz_offset,
                wanted: record.gz_length as usize,
            });
        }
        Err(e) => return Err(e.into()),
    }

    if verify {
        let computed = crc32fast::hash(&payload);
        if computed != record.crc32 {
            return Err(Error::CrcMismatch {
                segment: seg.file_name.clone(),
                frame_seq: record.frame_seq,
                stored: record.crc32,
                computed,
            });
        }
    }

    seg.idx_offset += RECORD_SIZE as u64;
    let commit_at = nanos_to_utc(record.commit_time);
    let frame = Frame {
        segment_id: seg.file_name.clone(),
        frame_seq: record.frame_seq,
        payload: Bytes::from(payload),
        uncompressed_length: record.uncompressed_length,
        commit_time: record.commit_time,
    };
    let cursor = Cursor {
        idx_path: seg.idx_path.clone(),
        idx_offset: seg.idx_offset,
        cur_gz: seg.file_name.clone(),
        last_file: seg.file_name.clone(),
        last_frame: record.frame_seq,
        last_commit_at: commit_at,
        // Stamped with the real ship time when the batch is committed.
        last_send_at: commit_at,
    };
    Ok(Some((frame, cursor)))
}

fn nanos_to_utc(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

// Integration coverage for the reader lives in tests/reader_edge_cases.rs;
// it needs full on-disk segment fixtures.
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_root_reports_no_frames() {
        let root = tempfile::tempdir().unwrap();
        let mut reader = WalReader::open(root.path(), None, false).await.unwrap();
        assert!(reader.next_frame().await.unwrap().is_none());
        assert_eq!(reader.current_segment(), None);
    }

    #[test]
    fn test_nanos_to_utc() {
        let dt = nanos_to_utc(1_735_689_600_123_456_789);
        assert_eq!(dt.timestamp(), 1_735_689_600);
        assert_eq!(dt.timestamp_subsec_nanos(), 123_456_789);
    }
}
