//! Shipper Configuration
//!
//! All knobs the core recognizes. Required: `wal_dir`. Everything else has
//! a default chosen to match long-standing deployments, so an upgraded
//! agent behaves identically with an old config.
//!
//! ## Defaults
//!
//! | Field | Default |
//! |---|---|
//! | `poll_interval` | 500 ms |
//! | `send_interval` (soft) | 5 s |
//! | `hard_interval` | 10 s |
//! | `http_timeout` | 15 s |
//! | `max_batch_bytes` | 4 MiB |
//! | `state_dir` | `wal_dir` |
//! | `service_url` | `https://api.apphash.io` |

use std::path::PathBuf;
use std::time::Duration;

use walship_core::Error;

/// Default endpoint for shipping WAL data.
pub const DEFAULT_SERVICE_URL: &str = "https://api.apphash.io";

/// Configuration for a shipper instance.
#[derive(Debug, Clone)]
pub struct ShipperConfig {
    /// Directory containing the WAL segments (required).
    pub wal_dir: PathBuf,

    /// Directory for the cursor file. Defaults to `wal_dir`.
    pub state_dir: PathBuf,

    /// Chain identifier forwarded to the sender.
    pub chain_id: String,

    /// Node identifier forwarded to the sender.
    pub node_id: String,

    /// API authentication key forwarded to the sender.
    pub auth_key: String,

    /// Ingestion endpoint. Trailing slashes are stripped.
    pub service_url: String,

    /// Idle sleep between polls when the WAL is drained.
    pub poll_interval: Duration,

    /// Soft send interval: an under-full batch ships after this long if
    /// the gates allow.
    pub send_interval: Duration,

    /// Hard send interval: an under-full batch ships after this long
    /// regardless of gate state.
    pub hard_interval: Duration,

    /// Per-send HTTP timeout.
    pub http_timeout: Duration,

    /// Maximum compressed bytes per batch.
    pub max_batch_bytes: usize,

    /// Process the available frames and exit instead of tailing.
    pub once: bool,

    /// Verify frame checksums while reading (debug).
    pub verify: bool,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            wal_dir: PathBuf::new(),
            state_dir: PathBuf::new(),
            chain_id: String::new(),
            node_id: String::new(),
            auth_key: String::new(),
            service_url: DEFAULT_SERVICE_URL.to_string(),
            poll_interval: Duration::from_millis(500),
            send_interval: Duration::from_secs(5),
            hard_interval: Duration::from_secs(10),
            http_timeout: Duration::from_secs(15),
            max_batch_bytes: 4 << 20,
            once: false,
            verify: false,
        }
    }
}

impl ShipperConfig {
    /// Validate the configuration, filling in derived fields.
    ///
    /// Called by the builder; callers constructing a config by hand can
    /// invoke it explicitly.
    pub fn validate(&mut self) -> walship_core::Result<()> {
        if self.wal_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("wal_dir is required".into()));
        }
        if self.state_dir.as_os_str().is_empty() {
            self.state_dir = self.wal_dir.clone();
        }
        if self.service_url.is_empty() {
            self.service_url = DEFAULT_SERVICE_URL.to_string();
        }
        while self.service_url.ends_with('/') {
            self.service_url.pop();
        }
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig("poll_interval must be positive".into()));
        }
        if self.send_interval.is_zero() {
            return Err(Error::InvalidConfig("send_interval must be positive".into()));
        }
        if self.hard_interval < self.send_interval {
            return Err(Error::InvalidConfig(
                "hard_interval must be at least send_interval".into(),
            ));
        }
        if self.max_batch_bytes == 0 {
            return Err(Error::InvalidConfig("max_batch_bytes must be positive".into()));
        }
        Ok(())
    }
}
