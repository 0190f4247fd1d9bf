//! Shipper - Lifecycle Orchestration and the Poll Loop
//!
//! The `Shipper` wires the reader, batcher, cursor store, sender, plugins
//! and event handler together under one state machine:
//!
//! ```text
//! Stopped ──start──▶ Starting ──init ok──▶ Running ──stop──▶ Stopping ──▶ Stopped
//!    ▲                   │                    │
//!    └────init err───────┘                    └──fatal──▶ Crashed (restartable)
//! ```
//!
//! ## The Driver Task
//!
//! A single spawned task owns the poll loop and all mutable shipping state
//! (reader handles, batcher, cursor store). Per iteration it:
//!
//! 1. asks the reader for the next frame; on end-of-input sleeps the poll
//!    interval (interruptibly)
//! 2. buffers the frame; a full batch closes immediately and the rejected
//!    frame opens the next one
//! 3. checks the size/time close triggers, polling gate hooks only once
//!    the soft deadline could matter
//! 4. ships a closed batch: success commits the cursor, notifies hooks and
//!    emits `OnSendSuccess`; retryable failures back off and retry the
//!    same batch; fatal failures crash the agent
//!
//! ## Ordering Guarantees
//!
//! Frames ship in (segment, seq) order. No batch is sent before its
//! predecessor's cursor commit, and `OnSendSuccess` for batch N strictly
//! precedes the first frame of batch N+1.
//!
//! ## Shutdown
//!
//! `stop()` signals the driver, which finishes an in-flight send (with a
//! retry budget bounded by the hard interval) but never ships a partially
//! built batch. `stop()` returns within
//! `hard_interval + http_timeout + grace`, aborting the driver if it
//! somehow exceeds that.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use walship_core::{Error as CoreError, ShipperState};
use walship_storage::{CursorStore, WalReader};

use crate::backoff::retry_backoff;
use crate::batch::{AddOutcome, Batch, Batcher};
use crate::config::ShipperConfig;
use crate::error::{Result, ShipperError};
use crate::events::{
    EventHandler, NoopEventHandler, SendErrorEvent, SendSuccessEvent, StateChangeEvent,
};
use crate::plugin::{Plugin, PluginContext};
use crate::sender::{SendError, SendMetadata, Sender};
use crate::shutdown::ShutdownHandle;

/// Slack granted to `stop()` beyond the drain and HTTP budgets.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Gate hooks slower than this are logged as misbehaving.
const SLOW_GATE: Duration = Duration::from_millis(100);

/// Consecutive read failures at the same position before crashing.
const MAX_READ_FAILURES: u32 = 3;

/// The WAL shipping agent.
///
/// Build one with [`Shipper::builder`], then drive it with `start()` and
/// `stop()`. Both are safe to call from any task; all shipping work runs
/// on an internal driver task.
pub struct Shipper {
    inner: Arc<ShipperInner>,
}

struct ShipperInner {
    config: ShipperConfig,
    sender: Arc<dyn Sender>,
    plugins: Vec<Arc<dyn Plugin>>,
    events: Arc<dyn EventHandler>,
    state: RwLock<ShipperState>,
    shutdown: Mutex<Option<ShutdownHandle>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Shipper {
    /// Create a new shipper builder.
    pub fn builder() -> ShipperBuilder {
        ShipperBuilder::new()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ShipperState {
        *self.inner.state.read().await
    }

    /// The validated configuration this shipper runs with.
    pub fn config(&self) -> &ShipperConfig {
        &self.inner.config
    }

    /// Start the agent: load the cursor, initialize plugins in
    /// registration order, spawn the driver.
    ///
    /// Valid from Stopped and Crashed; from any other state this is a
    /// warned no-op. On error the agent returns to Stopped and any plugins
    /// initialized so far are shut down in reverse order.
    pub async fn start(&self) -> Result<()> {
        let previous = {
            let mut state = self.inner.state.write().await;
            if !state.can_start() {
                warn!(state = %*state, "start ignored: not startable from this state");
                return Ok(());
            }
            let previous = *state;
            *state = ShipperState::Starting;
            previous
        };
        self.inner
            .emit_state(previous, ShipperState::Starting, "start requested");

        match self.init_and_spawn().await {
            Ok(()) => {
                self.inner
                    .transition(ShipperState::Running, "initialization complete")
                    .await;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "start failed");
                self.inner
                    .transition(ShipperState::Stopped, "initialization failed")
                    .await;
                Err(e)
            }
        }
    }

    /// Stop the agent gracefully.
    ///
    /// An in-flight send is allowed to finish (bounded retry budget); a
    /// partially built batch is discarded without sending. Plugins shut
    /// down in reverse initialization order. Returns within
    /// `hard_interval + http_timeout + grace`.
    ///
    /// Valid from Running and Starting; otherwise a warned no-op.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.inner.state.write().await;
            if !state.can_stop() {
                warn!(state = %*state, "stop ignored: not running");
                return Ok(());
            }
            let previous = *state;
            *state = ShipperState::Stopping;
            drop(state);
            self.inner
                .emit_state(previous, ShipperState::Stopping, "stop requested");
        }

        if let Some(shutdown) = self.inner.shutdown.lock().await.take() {
            shutdown.shutdown();
        }

        let handle = self.inner.driver.lock().await.take();
        if let Some(mut handle) = handle {
            let cfg = &self.inner.config;
            let budget = cfg.hard_interval + cfg.http_timeout + STOP_GRACE;
            match tokio::time::timeout(budget, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "driver task terminated abnormally"),
                Err(_) => {
                    warn!(
                        budget_ms = budget.as_millis() as u64,
                        "driver did not drain in time, aborting"
                    );
                    handle.abort();
                    let _ = handle.await;
                }
            }
        }

        self.inner.shutdown_plugins().await;

        // The driver may have moved the state itself (crash during drain,
        // once-mode completion); only a plain drain transitions here.
        let previous = {
            let mut state = self.inner.state.write().await;
            if *state == ShipperState::Stopping {
                *state = ShipperState::Stopped;
                Some(ShipperState::Stopping)
            } else {
                None
            }
        };
        if let Some(previous) = previous {
            self.inner
                .emit_state(previous, ShipperState::Stopped, "drain complete");
        }
        Ok(())
    }

    async fn init_and_spawn(&self) -> Result<()> {
        let cfg = &self.inner.config;

        let store = CursorStore::open(&cfg.state_dir).await?;
        let reader = WalReader::open(&cfg.wal_dir, store.cursor(), cfg.verify).await?;
        info!(
            wal_dir = %cfg.wal_dir.display(),
            resume = store.cursor().is_some(),
            once = cfg.once,
            "walship starting"
        );

        let ctx = PluginContext {
            wal_dir: cfg.wal_dir.clone(),
            state_dir: cfg.state_dir.clone(),
            service_url: cfg.service_url.clone(),
            chain_id: cfg.chain_id.clone(),
            node_id: cfg.node_id.clone(),
        };
        let mut initialized: Vec<Arc<dyn Plugin>> = Vec::new();
        for plugin in &self.inner.plugins {
            if let Err(source) = plugin.initialize(&ctx).await {
                error!(plugin = plugin.name(), error = %source, "plugin initialization failed");
                for earlier in initialized.iter().rev() {
                    if let Err(e) = earlier.shutdown().await {
                        warn!(plugin = earlier.name(), error = %e, "plugin shutdown failed");
                    }
                }
                return Err(ShipperError::PluginInit {
                    name: plugin.name().to_string(),
                    source,
                });
            }
            debug!(plugin = plugin.name(), "plugin initialized");
            initialized.push(Arc::clone(plugin));
        }

        let shutdown = ShutdownHandle::new();
        *self.inner.shutdown.lock().await = Some(shutdown.clone());
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            drive(inner, reader, store, shutdown).await;
        });
        *self.inner.driver.lock().await = Some(handle);
        Ok(())
    }
}

impl ShipperInner {
    fn emit_state(&self, previous: ShipperState, current: ShipperState, reason: &str) {
        info!(%previous, %current, reason, "state changed");
        self.events.on_state_change(StateChangeEvent {
            previous,
            current,
            reason: reason.to_string(),
        });
    }

    async fn transition(&self, to: ShipperState, reason: &str) {
        let previous = {
            let mut state = self.state.write().await;
            let previous = *state;
            *state = to;
            previous
        };
        self.emit_state(previous, to, reason);
    }

    async fn shutdown_plugins(&self) {
        for plugin in self.plugins.iter().rev() {
            match plugin.shutdown().await {
                Ok(()) => debug!(plugin = plugin.name(), "plugin shut down"),
                Err(e) => warn!(plugin = plugin.name(), error = %e, "plugin shutdown failed"),
            }
        }
    }

    /// AND of every gate's pre-send verdict. Gate errors count as vetoes.
    async fn gates_open(&self) -> bool {
        let mut open = true;
        for plugin in &self.plugins {
            let Some(gate) = plugin.gate_hook() else {
                continue;
            };
            let started = Instant::now();
            match gate.before_send().await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(plugin = plugin.name(), "gate vetoed send");
                    open = false;
                }
                Err(e) => {
                    warn!(plugin = plugin.name(), error = %e, "gate hook failed, treating as veto");
                    open = false;
                }
            }
            let elapsed = started.elapsed();
            if elapsed > SLOW_GATE {
                warn!(
                    plugin = plugin.name(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "slow gate hook"
                );
            }
        }
        open
    }

    async fn notify_after_send(&self, frame_count: usize, bytes_sent: usize) {
        for plugin in &self.plugins {
            let Some(gate) = plugin.gate_hook() else {
                continue;
            };
            if let Err(e) = gate.after_send(frame_count, bytes_sent).await {
                warn!(plugin = plugin.name(), error = %e, "after-send hook failed");
            }
        }
    }
}

enum ShipOutcome {
    /// Sent and cursor committed.
    Shipped,

    /// Gave up during drain; the batch will be re-read after restart.
    Abandoned,

    /// Unrecoverable; the agent crashes.
    Fatal,
}

/// The poll loop. Sole owner of the reader, batcher and cursor store.
async fn drive(
    inner: Arc<ShipperInner>,
    mut reader: WalReader,
    mut store: CursorStore,
    mut shutdown: ShutdownHandle,
) {
    let cfg = &inner.config;
    let metadata = SendMetadata {
        chain_id: cfg.chain_id.clone(),
        node_id: cfg.node_id.clone(),
        auth_key: cfg.auth_key.clone(),
        service_url: cfg.service_url.clone(),
    };
    let mut batcher = Batcher::new(cfg.max_batch_bytes, cfg.send_interval, cfg.hard_interval);
    let mut eof_streak: u32 = 0;
    let mut read_failures: u32 = 0;

    loop {
        if shutdown.is_shutdown() {
            if !batcher.is_empty() {
                // A partially built batch is never sent on stop; the
                // cursor stays put and the frames are re-read on restart.
                info!(frames = batcher.len(), "discarding partial batch on stop");
            }
            return;
        }

        let mut idle = false;
        match reader.next_frame().await {
            Ok(Some((frame, cursor))) => {
                eof_streak = 0;
                read_failures = 0;
                if let AddOutcome::Full(frame, cursor) = batcher.add(frame, cursor) {
                    if let Some(batch) = batcher.flush() {
                        match ship(&inner, &mut store, &metadata, batch, &mut shutdown).await {
                            ShipOutcome::Shipped => {}
                            ShipOutcome::Abandoned => return,
                            ShipOutcome::Fatal => {
                                crash(&inner).await;
                                return;
                            }
                        }
                    }
                    // An empty batch accepts any frame.
                    let _ = batcher.add(frame, cursor);
                }
            }
            Ok(None) => {
                eof_streak += 1;
                read_failures = 0;
                idle = true;
                if cfg.once && eof_streak >= 2 {
                    // Sustained end-of-input: ship what we have and exit.
                    if let Some(batch) = batcher.flush() {
                        match ship(&inner, &mut store, &metadata, batch, &mut shutdown).await {
                            ShipOutcome::Shipped => {}
                            ShipOutcome::Abandoned => return,
                            ShipOutcome::Fatal => {
                                crash(&inner).await;
                                return;
                            }
                        }
                    }
                    info!("once mode: WAL drained, exiting");
                    inner.shutdown_plugins().await;
                    inner
                        .transition(ShipperState::Stopped, "once mode complete")
                        .await;
                    return;
                }
            }
            Err(e) => {
                read_failures += 1;
                let fatal = read_failures >= MAX_READ_FAILURES;
                error!(
                    error = %e,
                    failures = read_failures,
                    "WAL read failed"
                );
                inner.events.on_send_error(SendErrorEvent {
                    error: e.to_string(),
                    frame_count: batcher.len(),
                    retryable: !fatal,
                });
                if fatal {
                    crash(&inner).await;
                    return;
                }
                // The producer may heal the file; wait one hard interval.
                sleep_interruptible(cfg.hard_interval, &mut shutdown).await;
                continue;
            }
        }

        let now = Instant::now();
        let gate_open = if batcher.soft_due(now) {
            inner.gates_open().await
        } else {
            true
        };
        if let Some(batch) = batcher.maybe_close(now, gate_open) {
            match ship(&inner, &mut store, &metadata, batch, &mut shutdown).await {
                ShipOutcome::Shipped => {}
                ShipOutcome::Abandoned => return,
                ShipOutcome::Fatal => {
                    crash(&inner).await;
                    return;
                }
            }
        } else if idle {
            sleep_interruptible(cfg.poll_interval, &mut shutdown).await;
        }
    }
}

/// Send one batch, retrying retryable failures with capped backoff.
/// On success the cursor is committed before returning, so the next batch
/// can never start ahead of durable progress.
async fn ship(
    inner: &Arc<ShipperInner>,
    store: &mut CursorStore,
    metadata: &SendMetadata,
    batch: Batch,
    shutdown: &mut ShutdownHandle,
) -> ShipOutcome {
    let cfg = &inner.config;
    let frame_count = batch.frame_count();
    let bytes = batch.total_bytes;
    let first_attempt = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        let started = Instant::now();
        match inner.sender.send(&batch, metadata).await {
            Ok(()) => {
                let mut cursor = batch.last_cursor.clone();
                cursor.last_send_at = Utc::now();
                if let Err(e) = store.commit(cursor).await {
                    // Regression or state-file I/O failure: either way the
                    // agent cannot trust its own progress any more.
                    error!(error = %e, "cursor commit failed");
                    inner.events.on_send_error(SendErrorEvent {
                        error: e.to_string(),
                        frame_count,
                        retryable: false,
                    });
                    return ShipOutcome::Fatal;
                }
                inner.notify_after_send(frame_count, bytes).await;
                let duration = started.elapsed();
                info!(
                    frames = frame_count,
                    bytes,
                    duration_ms = duration.as_millis() as u64,
                    "batch shipped"
                );
                inner.events.on_send_success(SendSuccessEvent {
                    frame_count,
                    bytes_sent: bytes,
                    duration,
                });
                return ShipOutcome::Shipped;
            }
            Err(SendError::Retryable(e)) => {
                warn!(error = %e, attempt = attempt + 1, "retryable send failure");
                inner.events.on_send_error(SendErrorEvent {
                    error: e.to_string(),
                    frame_count,
                    retryable: true,
                });
                let delay = retry_backoff(attempt, cfg.hard_interval);
                attempt = attempt.saturating_add(1);
                if shutdown.is_shutdown() {
                    // Draining: bounded retry budget, then hand the batch
                    // back to the WAL (the cursor never advanced).
                    if first_attempt.elapsed() + delay >= cfg.hard_interval {
                        warn!(frames = frame_count, "drain budget exhausted, abandoning batch");
                        return ShipOutcome::Abandoned;
                    }
                    tokio::time::sleep(delay).await;
                } else {
                    sleep_interruptible(delay, shutdown).await;
                }
            }
            Err(SendError::Fatal(e)) => {
                error!(error = %e, "fatal send failure");
                inner.events.on_send_error(SendErrorEvent {
                    error: e.to_string(),
                    frame_count,
                    retryable: false,
                });
                return ShipOutcome::Fatal;
            }
        }
    }
}

async fn crash(inner: &Arc<ShipperInner>) {
    inner.transition(ShipperState::Crashed, "fatal error").await;
    inner.shutdown_plugins().await;
}

async fn sleep_interruptible(duration: Duration, shutdown: &mut ShutdownHandle) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.wait() => {}
    }
}

/// Builder for [`Shipper`].
pub struct ShipperBuilder {
    config: ShipperConfig,
    sender: Option<Arc<dyn Sender>>,
    plugins: Vec<Arc<dyn Plugin>>,
    events: Option<Arc<dyn EventHandler>>,
}

impl ShipperBuilder {
    pub fn new() -> Self {
        Self {
            config: ShipperConfig::default(),
            sender: None,
            plugins: Vec::new(),
            events: None,
        }
    }

    /// Set the full configuration.
    pub fn config(mut self, config: ShipperConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the sender. Required.
    pub fn sender(mut self, sender: Arc<dyn Sender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Register a plugin. Initialization order is registration order;
    /// shutdown order is the reverse.
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Install an event handler. Defaults to a no-op handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.events = Some(handler);
        self
    }

    /// Validate the configuration and build the shipper.
    pub fn build(mut self) -> Result<Shipper> {
        self.config.validate()?;
        let sender = self
            .sender
            .ok_or_else(|| CoreError::InvalidConfig("a sender is required".into()))?;
        Ok(Shipper {
            inner: Arc::new(ShipperInner {
                config: self.config,
                sender,
                plugins: self.plugins,
                events: self
                    .events
                    .unwrap_or_else(|| Arc::new(NoopEventHandler)),
                state: RwLock::new(ShipperState::Stopped),
                shutdown: Mutex::new(None),
                driver: Mutex::new(None),
            }),
        })
    }
}

impl Default for ShipperBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct NullSender;

    #[async_trait]
    impl Sender for NullSender {
        async fn send(
            &self,
            _batch: &Batch,
            _metadata: &SendMetadata,
        ) -> std::result::Result<(), SendError> {
            Ok(())
        }
    }

    fn config(wal_dir: &std::path::Path) -> ShipperConfig {
        ShipperConfig {
            wal_dir: wal_dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_builder_requires_sender() {
        let dir = tempfile::tempdir().unwrap();
        let result = Shipper::builder().config(config(dir.path())).build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_builder_requires_wal_dir() {
        let result = Shipper::builder().sender(Arc::new(NullSender)).build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_builder_validates_config() {
        let dir = tempfile::tempdir().unwrap();
        let shipper = Shipper::builder()
            .config(ShipperConfig {
                wal_dir: dir.path().to_path_buf(),
                service_url: "https://ingest.example.com/".to_string(),
                ..Default::default()
            })
            .sender(Arc::new(NullSender))
            .build()
            .unwrap();
        assert_eq!(shipper.config().service_url, "https://ingest.example.com");
        assert_eq!(shipper.config().state_dir, dir.path().to_path_buf());
    }

    #[tokio::test]
    async fn test_initial_state_is_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let shipper = Shipper::builder()
            .config(config(dir.path()))
            .sender(Arc::new(NullSender))
            .build()
            .unwrap();
        assert_eq!(shipper.state().await, ShipperState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let shipper = Shipper::builder()
            .config(config(dir.path()))
            .sender(Arc::new(NullSender))
            .build()
            .unwrap();
        shipper.stop().await.unwrap();
        assert_eq!(shipper.state().await, ShipperState::Stopped);
    }

    #[tokio::test]
    async fn test_start_stop_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let shipper = Shipper::builder()
            .config(config(dir.path()))
            .sender(Arc::new(NullSender))
            .build()
            .unwrap();

        shipper.start().await.unwrap();
        assert_eq!(shipper.state().await, ShipperState::Running);

        // A second start while running is a no-op.
        shipper.start().await.unwrap();
        assert_eq!(shipper.state().await, ShipperState::Running);

        shipper.stop().await.unwrap();
        assert_eq!(shipper.state().await, ShipperState::Stopped);
    }

    #[tokio::test]
    async fn test_corrupt_cursor_refuses_to_start() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("status.json"), b"~garbage~").unwrap();

        let shipper = Shipper::builder()
            .config(config(dir.path()))
            .sender(Arc::new(NullSender))
            .build()
            .unwrap();

        let err = shipper.start().await.unwrap_err();
        assert!(matches!(
            err,
            ShipperError::Core(CoreError::CursorCorrupt { .. })
        ));
        assert_eq!(shipper.state().await, ShipperState::Stopped);
    }

    #[tokio::test]
    async fn test_config_accessor_reflects_derived_fields() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state");
        let shipper = Shipper::builder()
            .config(ShipperConfig {
                wal_dir: dir.path().to_path_buf(),
                state_dir: state.clone(),
                ..Default::default()
            })
            .sender(Arc::new(NullSender))
            .build()
            .unwrap();
        assert_eq!(shipper.config().state_dir, PathBuf::from(state));
    }
}
