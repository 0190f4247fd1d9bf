//! Operational Events
//!
//! The shipper reports state transitions and send outcomes through an
//! `EventHandler` supplied at build time. All methods are called
//! synchronously on the driver task, so handlers must return quickly;
//! anything slow belongs on a channel of the handler's own.
//!
//! Every method has a no-op default, so handlers implement only what they
//! care about.

use std::time::Duration;

use walship_core::ShipperState;

/// A lifecycle state transition.
#[derive(Debug, Clone)]
pub struct StateChangeEvent {
    /// State before the transition.
    pub previous: ShipperState,

    /// State after the transition.
    pub current: ShipperState,

    /// Why the transition occurred.
    pub reason: String,
}

/// A batch was transmitted and the cursor advanced.
#[derive(Debug, Clone)]
pub struct SendSuccessEvent {
    /// Frames in the shipped batch.
    pub frame_count: usize,

    /// Compressed bytes transmitted.
    pub bytes_sent: usize,

    /// Wall time of the successful send attempt.
    pub duration: Duration,
}

/// A send or read attempt failed.
#[derive(Debug, Clone)]
pub struct SendErrorEvent {
    /// Rendered error message.
    pub error: String,

    /// Frames affected by the failure.
    pub frame_count: usize,

    /// Whether the operation will be retried.
    pub retryable: bool,
}

/// Receives lifecycle and operational events from the shipper.
pub trait EventHandler: Send + Sync {
    /// Called when the agent transitions between lifecycle states.
    fn on_state_change(&self, _event: StateChangeEvent) {}

    /// Called after frames are successfully transmitted.
    fn on_send_success(&self, _event: SendSuccessEvent) {}

    /// Called when a send or read operation fails.
    fn on_send_error(&self, _event: SendErrorEvent) {}
}

/// Event handler that discards everything. The default when the embedder
/// installs none.
#[derive(Debug, Default)]
pub struct NoopEventHandler;

impl EventHandler for NoopEventHandler {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_handler_accepts_all_events() {
        let handler = NoopEventHandler;
        handler.on_state_change(StateChangeEvent {
            previous: ShipperState::Stopped,
            current: ShipperState::Starting,
            reason: "start requested".to_string(),
        });
        handler.on_send_success(SendSuccessEvent {
            frame_count: 10,
            bytes_sent: 1024,
            duration: Duration::from_millis(25),
        });
        handler.on_send_error(SendErrorEvent {
            error: "connection refused".to_string(),
            frame_count: 10,
            retryable: true,
        });
    }

    #[test]
    fn test_events_are_cloneable() {
        let event = SendErrorEvent {
            error: "timeout".to_string(),
            frame_count: 3,
            retryable: true,
        };
        let cloned = event.clone();
        assert_eq!(cloned.frame_count, 3);
        assert!(cloned.retryable);
    }
}
