//! Durable Cursor Store
//!
//! Persists the shipping cursor to `status.json` in the state directory.
//! The file is the single source of truth for "what has been shipped"; the
//! downstream service dedupes on it, so the store must never lose a commit
//! nor let the cursor move backwards.
//!
//! ## Atomicity
//!
//! Every commit writes `status.json.tmp` in the same directory, fsyncs it,
//! then renames it over `status.json`. A crash at any point leaves either
//! the old or the new cursor on disk, never a torn one.
//!
//! ## Forward-Only Invariant
//!
//! `commit` rejects any cursor whose `(last_file, last_frame)` orders
//! before the committed value. A rejection indicates an internal bug and is
//! surfaced as fatal by the orchestrator.
//!
//! Load semantics: a missing file means "no cursor, start from the first
//! frame"; an unparseable file means operator intervention is required and
//! the shipper refuses to start.

use std::path::PathBuf;

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use walship_core::{Cursor, Error, Result};

/// Name of the cursor file inside the state directory.
pub const STATUS_FILE: &str = "status.json";

const STATUS_TMP_FILE: &str = "status.json.tmp";

/// Exclusive owner of the on-disk cursor.
#[derive(Debug)]
pub struct CursorStore {
    path: PathBuf,
    tmp_path: PathBuf,
    current: Option<Cursor>,
}

impl CursorStore {
    /// Open the store, eagerly loading any existing cursor.
    pub async fn open(state_dir: impl Into<PathBuf>) -> Result<Self> {
        let state_dir = state_dir.into();
        let path = state_dir.join(STATUS_FILE);
        let tmp_path = state_dir.join(STATUS_TMP_FILE);

        let current = match fs::read(&path).await {
            Ok(bytes) => {
                let cursor: Cursor =
                    serde_json::from_slice(&bytes).map_err(|e| Error::CursorCorrupt {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                info!(
                    file = %cursor.last_file,
                    frame = cursor.last_frame,
                    "loaded cursor"
                );
                Some(cursor)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cursor file, starting fresh");
                None
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            tmp_path,
            current,
        })
    }

    /// The last committed cursor, if any.
    pub fn cursor(&self) -> Option<&Cursor> {
        self.current.as_ref()
    }

    /// Atomically replace the on-disk cursor.
    ///
    /// Rejects cursors that would move `(last_file, last_frame)` backwards.
    /// Committing the same position again is allowed (it refreshes the
    /// timestamps).
    pub async fn commit(&mut self, cursor: Cursor) -> Result<()> {
        if let Some(committed) = &self.current {
            if cursor.position() < committed.position() {
                return Err(Error::CursorRegression {
                    file: cursor.last_file.clone(),
                    frame: cursor.last_frame,
                    committed_file: committed.last_file.clone(),
                    committed_frame: committed.last_frame,
                });
            }
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(&cursor)?;
        let mut tmp = File::create(&self.tmp_path).await?;
        tmp.write_all(&bytes).await?;
        tmp.sync_all().await?;
        drop(tmp);
        fs::rename(&self.tmp_path, &self.path).await?;

        debug!(
            file = %cursor.last_file,
            frame = cursor.last_frame,
            idx_offset = cursor.idx_offset,
            "cursor committed"
        );
        self.current = Some(cursor);
        Ok(())
    }
}
