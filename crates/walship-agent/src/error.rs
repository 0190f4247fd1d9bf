//! Error types for the walship agent.
//!
//! The agent's public surface (`start`, `stop`) reports `ShipperError`.
//! Most failures originate in the shared core taxonomy and pass through
//! transparently; the agent adds only the failure modes it owns (plugin
//! initialization, driver task supervision).

use thiserror::Error;

/// Boxed error used across the plugin and sender seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience type alias for `Result<T, ShipperError>`.
pub type Result<T> = std::result::Result<T, ShipperError>;

#[derive(Debug, Error)]
pub enum ShipperError {
    /// A core-level failure: invalid config, corrupt cursor, reader I/O.
    #[error(transparent)]
    Core(#[from] walship_core::Error),

    /// A plugin refused to initialize; the shipper stays Stopped.
    #[error("plugin {name} failed to initialize: {source}")]
    PluginInit {
        name: String,
        #[source]
        source: BoxError,
    },

    /// The driver task could not be joined.
    #[error("driver task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_is_transparent() {
        let err: ShipperError = walship_core::Error::InvalidConfig("wal_dir is required".into()).into();
        assert_eq!(format!("{}", err), "invalid config: wal_dir is required");
    }

    #[test]
    fn test_plugin_init_error_names_plugin() {
        let err = ShipperError::PluginInit {
            name: "resourcegating".to_string(),
            source: "no interface stats".into(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("resourcegating"));
        assert!(msg.contains("no interface stats"));
    }
}
