//! Walship Core - Shared Types for the WAL Shipper
//!
//! This crate holds the data model shared by the storage layer and the
//! shipping agent:
//!
//! - **IndexRecord**: the 36-byte on-disk sidecar record describing a frame
//! - **Frame**: one opaque compressed payload in memory
//! - **Cursor**: the durable "last shipped frame" pointer
//! - **ShipperState**: the agent lifecycle state machine
//! - **Error**: the error taxonomy every layer maps into

pub mod cursor;
pub mod error;
pub mod frame;
pub mod index;
pub mod state;

pub use cursor::Cursor;
pub use error::{Error, Result};
pub use frame::Frame;
pub use index::{IndexRecord, RECORD_SIZE};
pub use state::ShipperState;
