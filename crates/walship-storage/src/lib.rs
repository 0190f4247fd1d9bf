//! Walship Storage - WAL Reading and Cursor Persistence
//!
//! This crate owns every byte that touches disk:
//!
//! - **segments**: enumeration of the WAL root (date directories, segment
//!   files, index sidecars)
//! - **WalReader**: sequential frame reads via the index sidecar and
//!   byte-range fetches from the compressed segment
//! - **CursorStore**: atomic, forward-only persistence of the shipping
//!   cursor
//!
//! WAL files are strictly read-only to this crate; the only file it ever
//! writes is the cursor, and only via atomic rename.

pub mod cursor_store;
pub mod reader;
pub mod segments;

pub use cursor_store::{CursorStore, STATUS_FILE};
pub use reader::WalReader;
pub use segments::{index_name, list_segments, SegmentEntry, INDEX_SUFFIX, SEGMENT_SUFFIX};
