//! Status polling
//!
//! Queries temperatures and position on a timer and publishes the result
//! as a `StatusSnapshot`. The poller is the snapshot's only writer;
//! readers get copies through a `watch` channel.

use crate::communication::{CommandChannel, Conversation, SendOptions};
use crate::firmware::{Capability, FirmwareDialect};
use parking_lot::Mutex;
use printkit_core::{ChannelError, EventDispatcher, PollMode, PrinterEvent, StatusSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Poll cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Interval while idle
    pub idle_interval: Duration,
    /// Interval while a print runs
    pub print_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(2),
            print_interval: Duration::from_secs(10),
        }
    }
}

impl PollerConfig {
    /// Interval for a poll mode
    pub fn interval(&self, mode: PollMode) -> Duration {
        match mode {
            PollMode::Idle => self.idle_interval,
            PollMode::Printing => self.print_interval,
        }
    }
}

struct PollerInner {
    dialect: Arc<dyn FirmwareDialect>,
    config: PollerConfig,
    events: EventDispatcher,
    snapshot_tx: watch::Sender<StatusSnapshot>,
    mode_tx: watch::Sender<PollMode>,
}

impl PollerInner {
    async fn poll_once(&self, channel: &CommandChannel) -> Result<bool, ChannelError> {
        let lease = match channel.try_acquire(Conversation::StatusPoll) {
            Ok(lease) => lease,
            Err(ChannelError::Busy { owner }) => {
                tracing::debug!("Skipping status poll: {} owns the channel", owner);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let mut snapshot = *self.snapshot_tx.borrow();

        let reply = lease
            .send(self.dialect.temperature_query(), SendOptions::quiet())
            .await?
            .unwrap_or_default();
        if let Some(report) = self.dialect.parse_temperatures(&reply) {
            snapshot.apply_temperatures(report);
        }

        if self.dialect.supports(Capability::PositionReport) {
            let reply = lease
                .send(self.dialect.position_query(), SendOptions::quiet())
                .await?
                .unwrap_or_default();
            if let Some(position) = self.dialect.parse_position(&reply) {
                snapshot.apply_position(position);
            }
        }

        let changed = self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
        if changed {
            self.events.publish(PrinterEvent::StatusUpdated(snapshot));
        }
        Ok(changed)
    }

    fn reset(&self) {
        self.snapshot_tx.send_replace(StatusSnapshot::unknown());
    }
}

/// Periodic temperature and position poller
pub struct StatusPoller {
    inner: Arc<PollerInner>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl StatusPoller {
    /// Create an inert poller
    pub fn new(
        dialect: Arc<dyn FirmwareDialect>,
        config: PollerConfig,
        events: EventDispatcher,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(StatusSnapshot::unknown());
        let (mode_tx, _) = watch::channel(PollMode::Idle);
        Self {
            inner: Arc::new(PollerInner {
                dialect,
                config,
                events,
                snapshot_tx,
                mode_tx,
            }),
            task: Mutex::new(None),
        }
    }

    /// Start polling a channel, replacing any previous polling task
    pub fn start(&self, channel: CommandChannel) {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(self.inner.clone(), channel, cancel.clone()));
        if let Some((old_cancel, old_handle)) = self.task.lock().replace((cancel, handle)) {
            old_cancel.cancel();
            old_handle.abort();
        }
        tracing::debug!("Status polling started ({})", self.mode());
    }

    /// Stop polling and forget all readings
    pub async fn stop(&self) {
        let task = self.task.lock().take();
        if let Some((cancel, handle)) = task {
            cancel.cancel();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!("Status poller ended abnormally: {}", e);
                }
            }
        }
        self.inner.reset();
    }

    /// Check whether a polling task is running
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    /// Switch cadence; takes effect immediately
    pub fn set_mode(&self, mode: PollMode) {
        let previous = self.inner.mode_tx.send_replace(mode);
        if previous != mode {
            tracing::info!("Polling mode: {} ({:?})", mode, self.inner.config.interval(mode));
            self.inner.events.publish(PrinterEvent::PollModeChanged(mode));
        }
    }

    /// Current cadence
    pub fn mode(&self) -> PollMode {
        *self.inner.mode_tx.borrow()
    }

    /// Copy of the latest snapshot
    pub fn snapshot(&self) -> StatusSnapshot {
        *self.inner.snapshot_tx.borrow()
    }

    /// Receiver notified whenever the snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Run one poll immediately
    ///
    /// Returns `Ok(false)` when the tick was skipped or nothing changed.
    pub async fn poll_once(&self, channel: &CommandChannel) -> Result<bool, ChannelError> {
        self.inner.poll_once(channel).await
    }
}

async fn poll_loop(inner: Arc<PollerInner>, channel: CommandChannel, cancel: CancellationToken) {
    let mut mode_rx = inner.mode_tx.subscribe();
    let closed = channel.closed_token();

    loop {
        let period = inner.config.interval(*mode_rx.borrow_and_update());
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = closed.cancelled() => {
                    inner.reset();
                    return;
                }
                changed = mode_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    break;
                }
                _ = ticker.tick() => {
                    match inner.poll_once(&channel).await {
                        Ok(_) => {}
                        Err(ChannelError::Busy { .. }) => {}
                        Err(e) => {
                            tracing::warn!("Status poll failed: {}", e);
                            inner.reset();
                            return;
                        }
                    }
                }
            }
        }
    }
}
