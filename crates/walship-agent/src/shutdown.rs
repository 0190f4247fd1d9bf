//! Shutdown Signaling
//!
//! A small watch-channel handle shared between `stop()` and the driver
//! task. Triggering is idempotent and observable from any clone; the
//! driver selects `wait()` against its sleeps so every suspension point is
//! interruptible.

use tokio::sync::watch;

/// Handle for triggering and observing shutdown.
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: watch::Sender<bool>,
    receiver: watch::Receiver<bool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self { sender, receiver }
    }

    /// Signal shutdown. Safe to call more than once.
    pub fn shutdown(&self) {
        let _ = self.sender.send(true);
    }

    /// Whether shutdown has been signaled.
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Complete once shutdown is signaled. Returns immediately if it
    /// already was.
    pub async fn wait(&mut self) {
        loop {
            if *self.receiver.borrow() {
                return;
            }
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_starts_not_shutdown() {
        let handle = ShutdownHandle::new();
        assert!(!handle.is_shutdown());
    }

    #[test]
    fn test_shutdown_is_idempotent_and_visible_to_clones() {
        let handle = ShutdownHandle::new();
        let clone = handle.clone();
        handle.shutdown();
        handle.shutdown();
        assert!(handle.is_shutdown());
        assert!(clone.is_shutdown());
    }

    #[tokio::test]
    async fn test_wait_returns_after_signal() {
        let handle = ShutdownHandle::new();
        let mut waiter = handle.clone();

        let task = tokio::spawn(async move {
            waiter.wait().await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("wait should complete")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_already_shutdown() {
        let handle = ShutdownHandle::new();
        handle.shutdown();
        let mut waiter = handle.clone();
        tokio::time::timeout(Duration::from_millis(100), waiter.wait())
            .await
            .expect("wait should not block");
    }
}
