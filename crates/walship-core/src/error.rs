//! Error Types for Walship
//!
//! This module defines all error types that can occur while shipping WAL data.
//!
//! ## Error Categories
//!
//! ### Configuration Errors
//! - `InvalidConfig`: Rejected at start; the shipper never leaves Stopped.
//!
//! ### Cursor Errors
//! - `CursorCorrupt`: The on-disk cursor could not be parsed. The shipper
//!   refuses to start; operator intervention is required.
//! - `CursorRegression`: A commit would move the cursor backwards. This is
//!   an internal bug and is surfaced as fatal.
//!
//! ### Read Errors
//! - `ShortRead`: A segment file is shorter than its index claims.
//! - `CrcMismatch`: Data corruption detected via checksum (verify mode).
//! - `Io`: File system operations failed.
//!
//! A trailing partial index record is NOT an error: the producer may still
//! be writing, so the reader reports end-of-input instead.
//!
//! ## Usage
//! All fallible operations return `Result<T>` which is aliased to
//! `Result<T, Error>`, allowing `?` for propagation.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("cursor file {path} is corrupt: {reason}")]
    CursorCorrupt { path: PathBuf, reason: String },

    #[error(
        "cursor regression: ({file}, {frame}) is behind committed ({committed_file}, {committed_frame})"
    )]
    CursorRegression {
        file: String,
        frame: u64,
        committed_file: String,
        committed_frame: u64,
    },

    #[error("short read in {path}: wanted {wanted} bytes at offset {offset}")]
    ShortRead {
        path: PathBuf,
        offset: u64,
        wanted: usize,
    },

    #[error("crc mismatch in {segment} frame {frame_seq}: stored {stored:#010x}, computed {computed:#010x}")]
    CrcMismatch {
        segment: String,
        frame_seq: u64,
        stored: u32,
        computed: u32,
    },

    #[error("cursor encode error: {0}")]
    CursorEncode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(format!("{}", err).contains("gone"));
    }

    #[test]
    fn test_crc_mismatch_message_is_hex() {
        let err = Error::CrcMismatch {
            segment: "seg-000001.wal.gz".to_string(),
            frame_seq: 7,
            stored: 0xDEAD_BEEF,
            computed: 0x0BAD_F00D,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("0xdeadbeef"));
        assert!(msg.contains("0x0badf00d"));
        assert!(msg.contains("frame 7"));
    }

    #[test]
    fn test_cursor_regression_message() {
        let err = Error::CursorRegression {
            file: "seg-000001.wal.gz".to_string(),
            frame: 3,
            committed_file: "seg-000002.wal.gz".to_string(),
            committed_frame: 10,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("seg-000001.wal.gz"));
        assert!(msg.contains("seg-000002.wal.gz"));
    }
}
