//! Durable Shipping Cursor
//!
//! The cursor records the last successfully shipped frame and survives
//! restarts: `idx_path` + `idx_offset` point at the byte immediately after
//! the last shipped index record, so a resumed reader picks up at the next
//! unsent frame.
//!
//! ## On-Disk Contract
//!
//! Serialized as a single JSON object. Key names are snake_case and MUST
//! stay that way: pre-existing state files written by earlier deployments
//! use exactly these keys. Timestamps are RFC 3339 with a fixed nine-digit
//! nanosecond field so that write → read → write is byte-identical.
//!
//! The ordering key of a cursor is `(last_file, last_frame)`; any frame at
//! or before that position is never re-sent.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable pointer to the last successfully shipped frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Path of the index sidecar the cursor points into.
    pub idx_path: PathBuf,

    /// Byte offset just past the last shipped record in `idx_path`.
    pub idx_offset: u64,

    /// Name of the segment currently being read.
    pub cur_gz: String,

    /// Name of the segment the last shipped frame came from.
    pub last_file: String,

    /// Sequence number of the last shipped frame.
    pub last_frame: u64,

    /// Commit time of the last shipped frame.
    #[serde(with = "rfc3339_nanos")]
    pub last_commit_at: DateTime<Utc>,

    /// Wall clock when the last batch ship completed.
    #[serde(with = "rfc3339_nanos")]
    pub last_send_at: DateTime<Utc>,
}

impl Cursor {
    /// The ordering key: `(last_file, last_frame)`. Comparisons over this
    /// key drive the forward-only commit check.
    pub fn position(&self) -> (&str, u64) {
        (self.last_file.as_str(), self.last_frame)
    }
}

/// RFC 3339 timestamps with fixed nanosecond precision.
///
/// Chrono's default serde trims trailing zeros, which would break the
/// byte-identical round-trip of the cursor file. Reading accepts any valid
/// RFC 3339 timestamp, so state files written with coarser precision still
/// load.
pub mod rfc3339_nanos {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
