//! Frame Batching Under Dual Size/Time Bounds
//!
//! Frames accumulate in memory until a batch closes, amortizing the cost of
//! HTTP round-trips while bounding end-to-end latency.
//!
//! ## Close Triggers
//!
//! A batch closes when ANY of these holds:
//! - **Size**: buffered bytes reach `max_bytes`
//! - **Soft time**: the first frame is `soft_interval` old AND every gate
//!   allows sending
//! - **Hard time**: the first frame is `hard_interval` old (gates ignored)
//! - **Manual**: `flush()` (shutdown, once-mode drain)
//!
//! The soft/hard split lets resource gates delay sends during local load
//! while the hard bound caps how long a frame can sit in memory.
//!
//! ## Ordering
//!
//! Frames are emitted in insertion order, which equals (segment, seq) order
//! under the driver's discipline. Each buffered frame carries the cursor
//! describing the position just past it; the closed batch exposes the first
//! and last of those so the driver can commit progress after a successful
//! send.
//!
//! NOT thread-safe: the driver task owns the batcher exclusively.

use std::time::{Duration, Instant};

use tracing::trace;
use walship_core::{Cursor, Frame};

/// A closed batch, ready to hand to the sender.
#[derive(Debug)]
pub struct Batch {
    /// Frames in (segment, seq) order.
    pub frames: Vec<Frame>,

    /// Sum of compressed frame sizes.
    pub total_bytes: usize,

    /// Cursor just past the first frame.
    pub first_cursor: Cursor,

    /// Cursor just past the last frame; committed on send success.
    pub last_cursor: Cursor,
}

impl Batch {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// Result of offering a frame to the batcher.
#[derive(Debug)]
pub enum AddOutcome {
    /// The frame was buffered.
    Accepted,

    /// The frame would push the batch past `max_bytes`. It is handed back;
    /// close the current batch, ship it, then re-add.
    Full(Frame, Cursor),
}

/// Accumulates frames until a size or time bound closes the batch.
#[derive(Debug)]
pub struct Batcher {
    max_bytes: usize,
    soft_interval: Duration,
    hard_interval: Duration,

    frames: Vec<Frame>,
    total_bytes: usize,
    first_added: Option<Instant>,
    first_cursor: Option<Cursor>,
    last_cursor: Option<Cursor>,
}

impl Batcher {
    pub fn new(max_bytes: usize, soft_interval: Duration, hard_interval: Duration) -> Self {
        Self {
            max_bytes,
            soft_interval,
            hard_interval,
            frames: Vec::new(),
            total_bytes: 0,
            first_added: None,
            first_cursor: None,
            last_cursor: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Offer a frame (with the cursor just past it) to the current batch.
    ///
    /// A single frame larger than `max_bytes` is accepted into an empty
    /// batch; frames are never split.
    pub fn add(&mut self, frame: Frame, cursor: Cursor) -> AddOutcome {
        let size = frame.compressed_size();
        if !self.frames.is_empty() && self.total_bytes + size > self.max_bytes {
            return AddOutcome::Full(frame, cursor);
        }
        if self.frames.is_empty() {
            self.first_added = Some(Instant::now());
            self.first_cursor = Some(cursor.clone());
        }
        self.total_bytes += size;
        self.frames.push(frame);
        self.last_cursor = Some(cursor);
        trace!(
            frames = self.frames.len(),
            bytes = self.total_bytes,
            "frame buffered"
        );
        AddOutcome::Accepted
    }

    /// True once the soft deadline has passed for the current batch.
    ///
    /// The driver uses this to avoid querying gate hooks before their
    /// answer could matter.
    pub fn soft_due(&self, now: Instant) -> bool {
        match self.first_added {
            Some(first) => now.saturating_duration_since(first) >= self.soft_interval,
            None => false,
        }
    }

    /// Close the batch if a size or time bound has been reached.
    ///
    /// `gate_open` is the AND of every gate's pre-send verdict; it only
    /// affects the soft deadline. The hard deadline closes regardless.
    pub fn maybe_close(&mut self, now: Instant, gate_open: bool) -> Option<Batch> {
        if self.frames.is_empty() {
            return None;
        }
        if self.total_bytes >= self.max_bytes {
            return self.take();
        }
        let age = now.saturating_duration_since(self.first_added?);
        if age >= self.hard_interval {
            return self.take();
        }
        if age >= self.soft_interval && gate_open {
            return self.take();
        }
        None
    }

    /// Close the batch unconditionally (shutdown, once-mode drain).
    pub fn flush(&mut self) -> Option<Batch> {
        if self.frames.is_empty() {
            None
        } else {
            self.take()
        }
    }

    fn take(&mut self) -> Option<Batch> {
        let frames = std::mem::take(&mut self.frames);
        let total_bytes = std::mem::replace(&mut self.total_bytes, 0);
        self.first_added = None;
        let first_cursor = self.first_cursor.take()?;
        let last_cursor = self.last_cursor.take()?;
        Some(Batch {
            frames,
            total_bytes,
            first_cursor,
            last_cursor,
        })
    }
}
