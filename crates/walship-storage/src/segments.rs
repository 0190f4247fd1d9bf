//! WAL Root Enumeration
//!
//! The WAL root holds date-named directories, each containing compressed
//! segments (`seg-NNNNNN.wal.gz`) with index sidecars (`seg-NNNNNN.wal.idx`).
//! Total ordering across the tree is (directory-name, segment-name)
//! lexicographic, which date-named directories satisfy naturally.
//!
//! Enumeration is re-run whenever the reader hits end-of-input, so segments
//! created by the producer after a listing are picked up on the next pass.
//! A segment only counts once both the `.gz` and its sidecar exist.

use std::path::{Path, PathBuf};

use tokio::fs;
use walship_core::Result;

/// Suffix of compressed segment files.
pub const SEGMENT_SUFFIX: &str = ".wal.gz";

/// Suffix of index sidecar files.
pub const INDEX_SUFFIX: &str = ".wal.idx";

/// One segment discovered under the WAL root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEntry {
    /// Segment file name, e.g. `seg-000001.wal.gz`.
    pub file_name: String,

    /// Full path of the compressed segment.
    pub gz_path: PathBuf,

    /// Full path of the index sidecar.
    pub idx_path: PathBuf,
}

/// Derive the sidecar name for a segment file name.
///
/// `seg-000001.wal.gz` → `seg-000001.wal.idx`. Returns `None` when the
/// name does not end in the segment suffix.
pub fn index_name(file_name: &str) -> Option<String> {
    file_name
        .strip_suffix(".gz")
        .filter(|_| file_name.ends_with(SEGMENT_SUFFIX))
        .map(|stem| format!("{stem}.idx"))
}

/// List all complete segments under `wal_dir` in (directory, file) order.
///
/// A missing root is treated as empty: the producer may not have created
/// it yet.
pub async fn list_segments(wal_dir: &Path) -> Result<Vec<SegmentEntry>> {
    let mut root = match fs::read_dir(wal_dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut root_files: Vec<(String, PathBuf)> = Vec::new();
    let mut dirs: Vec<(String, PathBuf)> = Vec::new();
    while let Some(entry) = root.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            dirs.push((name, entry.path()));
        } else if name.ends_with(SEGMENT_SUFFIX) {
            root_files.push((name, entry.path()));
        }
    }
    root_files.sort_by(|a, b| a.0.cmp(&b.0));
    dirs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut entries = Vec::new();
    for (name, path) in root_files {
        push_if_complete(&mut entries, name, path).await?;
    }
    for (_, dir_path) in dirs {
        let mut rd = fs::read_dir(&dir_path).await?;
        let mut files: Vec<(String, PathBuf)> = Vec::new();
        while let Some(entry) = rd.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_file() && name.ends_with(SEGMENT_SUFFIX) {
                files.push((name, entry.path()));
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, path) in files {
            push_if_complete(&mut entries, name, path).await?;
        }
    }
    Ok(entries)
}

/// First segment whose name sorts strictly after `last_file`.
///
/// With the typical globally increasing `seg-NNNNNN` naming this is the
/// next segment to read; an empty `last_file` selects the first segment.
pub fn next_after<'a>(entries: &'a [SegmentEntry], last_file: &str) -> Option<&'a SegmentEntry> {
    entries.iter().find(|e| e.file_name.as_str() > last_file)
}

async fn push_if_complete(
    entries: &mut Vec<SegmentEntry>,
    file_name: String,
    gz_path: PathBuf,
) -> Result<()> {
    let Some(idx_file) = index_name(&file_name) else {
        return Ok(());
    };
    let idx_path = gz_path.with_file_name(idx_file);
    if fs::try_exists(&idx_path).await? {
        entries.push(SegmentEntry {
            file_name,
            gz_path,
            idx_path,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_name() {
        assert_eq!(
            index_name("seg-000001.wal.gz").as_deref(),
            Some("seg-000001.wal.idx")
        );
        assert_eq!(index_name("seg-000001.wal.idx"), None);
        assert_eq!(index_name("notes.txt"), None);
    }

    #[test]
    fn test_next_after() {
        let entries: Vec<SegmentEntry> = ["seg-000001.wal.gz", "seg-000002.wal.gz"]
            .iter()
            .map(|name| SegmentEntry {
                file_name: name.to_string(),
                gz_path: PathBuf::from(name),
                idx_path: PathBuf::from(index_name(name).unwrap()),
            })
            .collect();

        assert_eq!(
            next_after(&entries, "").map(|e| e.file_name.as_str()),
            Some("seg-000001.wal.gz")
        );
        assert_eq!(
            next_after(&entries, "seg-000001.wal.gz").map(|e| e.file_name.as_str()),
            Some("seg-000002.wal.gz")
        );
        assert_eq!(next_after(&entries, "seg-000002.wal.gz"), None);
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let entries = list_segments(Path::new("/nonexistent/walship-test-root"))
            .await
            .unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_by_directory_then_file() {
        let root = tempfile::tempdir().unwrap();
        for (dir, file) in [
            ("2025-01-02", "seg-000003.wal.gz"),
            ("2025-01-01", "seg-000002.wal.gz"),
            ("2025-01-01", "seg-000001.wal.gz"),
        ] {
            let d = root.path().join(dir);
            std::fs::create_dir_all(&d).unwrap();
            std::fs::write(d.join(file), b"gz").unwrap();
            std::fs::write(d.join(index_name(file).unwrap()), b"").unwrap();
        }

        let entries = list_segments(root.path()).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "seg-000001.wal.gz",
                "seg-000002.wal.gz",
                "seg-000003.wal.gz"
            ]
        );
    }

    #[tokio::test]
    async fn test_list_skips_segment_without_sidecar() {
        let root = tempfile::tempdir().unwrap();
        let d = root.path().join("2025-01-01");
        std::fs::create_dir_all(&d).unwrap();
        std::fs::write(d.join("seg-000001.wal.gz"), b"gz").unwrap();

        let entries = list_segments(root.path()).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_list_ignores_unrelated_files() {
        let root = tempfile::tempdir().unwrap();
        let d = root.path().join("2025-01-01");
        std::fs::create_dir_all(&d).unwrap();
        std::fs::write(d.join("seg-000001.wal.gz"), b"gz").unwrap();
        std::fs::write(d.join("seg-000001.wal.idx"), b"").unwrap();
        std::fs::write(d.join("status.json"), b"{}").unwrap();
        std::fs::write(root.path().join("README"), b"hi").unwrap();

        let entries = list_segments(root.path()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name, "seg-000001.wal.gz");
    }
}
