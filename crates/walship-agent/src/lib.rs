//! Walship Agent - Streaming WAL Shipper
//!
//! A long-running agent that tails append-only WAL segments, packages their
//! compressed frames into size- and time-bounded batches, and ships them to
//! a remote ingestion endpoint while persisting a durable cursor that
//! survives restarts. Delivery is at-least-once on the wire; the downstream
//! service dedupes on the cursor.
//!
//! ## Components
//!
//! - **Shipper**: lifecycle state machine and the poll loop
//! - **Batcher**: dual size/time bounds with a soft/hard gate split
//! - **Sender**: pluggable transport (`HttpSender` ships in the box)
//! - **Plugin / GateHook**: optional features and send backpressure
//! - **EventHandler**: synchronous operational events
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use walship_agent::{HttpSender, Shipper, ShipperConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ShipperConfig {
//!     wal_dir: "/data/log.wal/node-1".into(),
//!     auth_key: "secret".into(),
//!     chain_id: "chain-1".into(),
//!     node_id: "node-1".into(),
//!     ..Default::default()
//! };
//!
//! let sender = Arc::new(HttpSender::new(config.http_timeout)?);
//! let shipper = Shipper::builder().config(config).sender(sender).build()?;
//!
//! shipper.start().await?;
//! // ... runs until stopped ...
//! shipper.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod batch;
pub mod config;
pub mod error;
pub mod events;
pub mod plugin;
pub mod sender;
pub mod shipper;
pub mod shutdown;

pub use batch::{AddOutcome, Batch, Batcher};
pub use config::{ShipperConfig, DEFAULT_SERVICE_URL};
pub use error::{BoxError, Result, ShipperError};
pub use events::{
    EventHandler, NoopEventHandler, SendErrorEvent, SendSuccessEvent, StateChangeEvent,
};
pub use plugin::{BasePlugin, GateHook, Plugin, PluginContext};
pub use sender::{HttpSender, SendError, SendMetadata, Sender};
pub use shipper::{Shipper, ShipperBuilder};
pub use shutdown::ShutdownHandle;

pub use walship_core::{Cursor, Frame, ShipperState};
