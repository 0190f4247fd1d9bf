//! Plugin and Gate Hook Contracts
//!
//! Optional features attach to the shipper as plugins. The orchestrator
//! initializes them in registration order when it starts and shuts them
//! down in reverse order when it stops; plugins never outlive the shipper.
//!
//! A plugin that also implements `GateHook` participates in send
//! gating: `before_send` can veto a soft-interval close (resource
//! backpressure being the canonical use), and `after_send` observes every
//! shipped batch. Gate verdicts compose with logical AND; a hook error is
//! logged and treated as a veto, never as fatal. Hooks run on the driver's
//! stack and are expected to return within 100 ms; the orchestrator logs
//! slower ones but does not enforce the bound.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::BoxError;

/// Configuration and context handed to plugins during initialization.
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Directory containing the WAL segments.
    pub wal_dir: PathBuf,

    /// Directory holding the cursor file.
    pub state_dir: PathBuf,

    /// Ingestion endpoint base URL.
    pub service_url: String,

    /// Chain identifier.
    pub chain_id: String,

    /// Node identifier.
    pub node_id: String,
}

/// An optional feature with a lifecycle tied to the shipper's.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Called during `start()`. An error prevents the shipper from
    /// starting; plugins initialized before this one are shut down in
    /// reverse order.
    async fn initialize(&self, ctx: &PluginContext) -> Result<(), BoxError>;

    /// Called during `stop()` (and on crash). Must release resources and
    /// stop any background work. May be called without a matching
    /// successful `initialize`.
    async fn shutdown(&self) -> Result<(), BoxError>;

    /// The plugin's gate hook, if it participates in send gating.
    fn gate_hook(&self) -> Option<&dyn GateHook> {
        None
    }
}

/// Pre/post-send interception points.
#[async_trait]
pub trait GateHook: Send + Sync {
    /// Called before a soft-interval batch close. `Ok(false)` delays the
    /// send; an error is logged and counts as a veto. Must be fast.
    async fn before_send(&self) -> Result<bool, BoxError>;

    /// Called after each successful batch send. Errors are logged and
    /// ignored.
    async fn after_send(&self, frame_count: usize, bytes_sent: usize) -> Result<(), BoxError>;
}

/// A `Plugin` that does nothing. Embed it (or copy its shape) when only
/// some of the contract matters.
pub struct BasePlugin {
    name: String,
}

impl BasePlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Plugin for BasePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self, _ctx: &PluginContext) -> Result<(), BoxError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        Ok(())
    }
}
