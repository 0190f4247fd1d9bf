//! Shipper Lifecycle States
//!
//! The shipper moves through a small state machine:
//!
//! ```text
//! Stopped ──Start──▶ Starting ──init ok──▶ Running ──Stop──▶ Stopping ──▶ Stopped
//!    ▲                   │                    │
//!    └────init err───────┘                    └──fatal──▶ Crashed ──Start──▶ Starting
//! ```
//!
//! Stopped and Crashed are the terminal states; Crashed is restartable.

use std::fmt;

/// Lifecycle state of a shipper instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipperState {
    /// The agent is not running.
    Stopped,

    /// Initialization is in progress.
    Starting,

    /// The agent is actively streaming.
    Running,

    /// Graceful shutdown is in progress.
    Stopping,

    /// The agent terminated due to an error.
    Crashed,
}

impl ShipperState {
    /// True while the agent is actively streaming.
    pub fn is_running(self) -> bool {
        self == ShipperState::Running
    }

    /// True if `start()` is valid from this state.
    pub fn can_start(self) -> bool {
        matches!(self, ShipperState::Stopped | ShipperState::Crashed)
    }

    /// True if `stop()` is valid from this state.
    pub fn can_stop(self) -> bool {
        matches!(self, ShipperState::Running | ShipperState::Starting)
    }
}

impl fmt::Display for ShipperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShipperState::Stopped => "Stopped",
            ShipperState::Starting => "Starting",
            ShipperState::Running => "Running",
            ShipperState::Stopping => "Stopping",
            ShipperState::Crashed => "Crashed",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ShipperState::Stopped), "Stopped");
        assert_eq!(format!("{}", ShipperState::Starting), "Starting");
        assert_eq!(format!("{}", ShipperState::Running), "Running");
        assert_eq!(format!("{}", ShipperState::Stopping), "Stopping");
        assert_eq!(format!("{}", ShipperState::Crashed), "Crashed");
    }

    #[test]
    fn test_is_running() {
        assert!(ShipperState::Running.is_running());
        assert!(!ShipperState::Stopped.is_running());
        assert!(!ShipperState::Starting.is_running());
        assert!(!ShipperState::Stopping.is_running());
        assert!(!ShipperState::Crashed.is_running());
    }

    #[test]
    fn test_can_start() {
        assert!(ShipperState::Stopped.can_start());
        assert!(ShipperState::Crashed.can_start());
        assert!(!ShipperState::Starting.can_start());
        assert!(!ShipperState::Running.can_start());
        assert!(!ShipperState::Stopping.can_start());
    }

    #[test]
    fn test_can_stop() {
        assert!(ShipperState::Running.can_stop());
        assert!(ShipperState::Starting.can_stop());
        assert!(!ShipperState::Stopped.can_stop());
        assert!(!ShipperState::Stopping.can_stop());
        assert!(!ShipperState::Crashed.can_stop());
    }
}
