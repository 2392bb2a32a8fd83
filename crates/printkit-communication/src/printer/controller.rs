//! Printer controller
//!
//! The facade a UI talks to. It owns the connection lifecycle and wires
//! the command channel, status poller, SD card session, and streamer to
//! a single event dispatcher.

use super::{
    ChannelSlot, GcodeStreamer, PollerConfig, SdCardConfig, SdCardSession, StatusPoller,
    StreamConfig, StreamHandle, StreamObserver,
};
use crate::communication::{
    ChannelConfig, CommandChannel, ConnectionParams, LogPolicy, SendOptions,
    SerialTransportFactory, TransportFactory,
};
use crate::firmware::{dialect_for, FirmwareDialect};
use parking_lot::RwLock;
use printkit_core::{
    dispatch_to_listener, ChannelError, ConnectionError, ConnectionState, ConsoleDirection,
    EventDispatcher, FirmwareKind, PollMode, PrinterEvent, PrinterListener,
    PrinterListenerHandle, SdCardError, StatusSnapshot, StreamError,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Everything the controller needs to know up front
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Firmware family of the attached printer
    pub firmware: FirmwareKind,
    /// Firmware settle delay after opening the port
    pub open_settle: Duration,
    /// Command response timing
    pub channel: ChannelConfig,
    /// Status poll cadence
    pub poller: PollerConfig,
    /// SD card timing
    pub sd_card: SdCardConfig,
    /// Streaming timing
    pub stream: StreamConfig,
    /// Drop the connection once an SD print starts
    pub disconnect_on_sd_print: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            firmware: FirmwareKind::Marlin,
            open_settle: Duration::from_millis(2000),
            channel: ChannelConfig::default(),
            poller: PollerConfig::default(),
            sd_card: SdCardConfig::default(),
            stream: StreamConfig::default(),
            disconnect_on_sd_print: false,
        }
    }
}

/// Connects to one printer and runs every printer-side operation
pub struct PrinterController {
    config: ControllerConfig,
    factory: Arc<dyn TransportFactory>,
    dialect: Arc<dyn FirmwareDialect>,
    events: EventDispatcher,
    slot: ChannelSlot,
    state: RwLock<ConnectionState>,
    connect_lock: tokio::sync::Mutex<()>,
    poller: StatusPoller,
    sd: SdCardSession,
    streamer: GcodeStreamer,
    listeners: RwLock<HashMap<String, JoinHandle<()>>>,
}

impl PrinterController {
    /// Create a controller that opens ports through `factory`
    pub fn new(config: ControllerConfig, factory: Arc<dyn TransportFactory>) -> Self {
        let dialect = dialect_for(config.firmware);
        let events = EventDispatcher::default();
        let slot = ChannelSlot::new();

        let poller = StatusPoller::new(dialect.clone(), config.poller, events.clone());
        let sd = SdCardSession::new(slot.clone(), dialect.clone(), config.sd_card, events.clone());
        let streamer = GcodeStreamer::new(slot.clone(), config.stream, events.clone());

        Self {
            config,
            factory,
            dialect,
            events,
            slot,
            state: RwLock::new(ConnectionState::Disconnected),
            connect_lock: tokio::sync::Mutex::new(()),
            poller,
            sd,
            streamer,
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Create a controller for real serial ports
    pub fn serial(config: ControllerConfig) -> Self {
        Self::new(config, Arc::new(SerialTransportFactory))
    }

    /// Firmware dialect in use
    pub fn dialect(&self) -> &Arc<dyn FirmwareDialect> {
        &self.dialect
    }

    /// Event dispatcher shared by every component
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Open a port and start polling
    ///
    /// An existing connection is closed first. On failure the controller
    /// stays disconnected.
    pub async fn connect(&self, port: &str, baud_rate: u32) -> Result<(), ConnectionError> {
        let _guard = self.connect_lock.lock().await;
        if self.slot.is_open() {
            self.shutdown_connection().await;
        }

        self.set_state(ConnectionState::Connecting);
        let params = ConnectionParams::new(port, baud_rate).with_open_settle(self.config.open_settle);

        let transport = match self.factory.open(&params) {
            Ok(transport) => transport,
            Err(e) => {
                tracing::warn!("Connect to {} failed: {}", port, e);
                self.events.publish(PrinterEvent::Error(e.to_string()));
                self.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        // Most boards reset when the port opens
        if !params.open_settle().is_zero() {
            tracing::debug!("Waiting {:?} for firmware to settle", params.open_settle());
            tokio::time::sleep(params.open_settle()).await;
        }

        let channel = CommandChannel::open(transport, self.config.channel, self.events.clone());
        self.slot.replace(Some(channel.clone()));
        self.poller.set_mode(PollMode::Idle);
        self.poller.start(channel);

        tracing::info!("Connected to {} @ {}", port, baud_rate);
        self.events.console(
            ConsoleDirection::Info,
            format!("Connected to {} @ {}", port, baud_rate),
        );
        self.set_state(ConnectionState::Connected {
            port: port.to_string(),
            baud_rate,
        });
        Ok(())
    }

    /// Close the connection
    ///
    /// A running stream is cancelled and the snapshot resets to unknown.
    /// Harmless when already disconnected.
    pub async fn disconnect(&self) {
        let _guard = self.connect_lock.lock().await;
        self.shutdown_connection().await;
    }

    async fn shutdown_connection(&self) {
        self.streamer.cancel_active();
        self.poller.stop().await;
        if let Some(channel) = self.slot.replace(None) {
            channel.close().await;
            tracing::info!("Disconnected from {}", channel.port());
            self.events.console(ConsoleDirection::Info, "Disconnected");
        }
        self.sd.clear();
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        let changed = {
            let mut current = self.state.write();
            let changed = *current != state;
            *current = state.clone();
            changed
        };
        if changed {
            self.events.publish(PrinterEvent::ConnectionChanged(state));
        }
    }

    /// Check whether commands can be sent
    pub fn is_connected(&self) -> bool {
        self.slot.is_open()
    }

    /// Current connection state
    ///
    /// Reports `Disconnected` after a forced disconnect even before
    /// anyone calls `disconnect`.
    pub fn connection_state(&self) -> ConnectionState {
        let state = self.state.read().clone();
        match state {
            ConnectionState::Connected { .. } if !self.slot.is_open() => {
                ConnectionState::Disconnected
            }
            other => other,
        }
    }

    /// Send a manual command and return the printer's reply
    pub async fn send_command(&self, command: &str) -> Result<Option<String>, ChannelError> {
        let channel = self.slot.get()?;
        channel.send(command, SendOptions::console()).await
    }

    /// Stop the printer immediately
    ///
    /// Cancels any stream and sends the firmware's emergency stop ahead of
    /// queued commands.
    pub async fn emergency_stop(&self) -> Result<(), ChannelError> {
        let channel = self.slot.get()?;
        if self.streamer.cancel_active() {
            tracing::info!("Stream cancelled by emergency stop");
        }
        tracing::warn!("Emergency stop");
        channel
            .send_priority(
                self.dialect.emergency_stop(),
                SendOptions {
                    expect_response: false,
                    log: LogPolicy::Console,
                },
            )
            .await?;
        Ok(())
    }

    /// Switch status poll cadence
    pub fn set_poll_mode(&self, mode: PollMode) {
        self.poller.set_mode(mode);
    }

    /// Current poll cadence
    pub fn poll_mode(&self) -> PollMode {
        self.poller.mode()
    }

    /// Copy of the latest telemetry; all unknown while disconnected
    pub fn snapshot(&self) -> StatusSnapshot {
        if self.is_connected() {
            self.poller.snapshot()
        } else {
            StatusSnapshot::unknown()
        }
    }

    /// Receiver notified whenever the snapshot changes
    pub fn watch_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.poller.subscribe()
    }

    /// Poll now instead of waiting for the next tick
    pub async fn refresh_status(&self) -> Result<StatusSnapshot, ChannelError> {
        let channel = self.slot.get()?;
        self.poller.poll_once(&channel).await?;
        Ok(self.poller.snapshot())
    }

    /// The SD card session
    ///
    /// Operations on it report `NotConnected` while disconnected.
    pub fn sd_session(&self) -> SdCardSession {
        self.sd.clone()
    }

    /// Print a file from the SD card
    ///
    /// Refreshes the listing first if the file is not in it. Afterwards
    /// either disconnects (if configured) or switches to print polling.
    pub async fn start_sd_print(&self, filename: &str) -> Result<String, SdCardError> {
        if let Err(SdCardError::UnknownFile { .. }) = self.sd.select(filename) {
            self.sd.refresh().await?;
            self.sd.select(filename)?;
        }

        let started = self.sd.start_print().await?;
        if self.config.disconnect_on_sd_print {
            tracing::info!("SD print started; disconnecting as configured");
            self.disconnect().await;
        } else {
            self.set_poll_mode(PollMode::Printing);
        }
        Ok(started)
    }

    /// Stream a G-code file in the background
    pub fn start_stream(
        &self,
        path: impl Into<PathBuf>,
        observer: Option<StreamObserver>,
    ) -> Result<StreamHandle, StreamError> {
        self.streamer.start(path, observer)
    }

    /// Cancel the running stream, if any
    pub fn cancel_stream(&self) -> bool {
        self.streamer.cancel_active()
    }

    /// Check whether a stream is running
    pub fn is_streaming(&self) -> bool {
        self.streamer.is_streaming()
    }

    /// Subscribe to raw events
    pub fn subscribe(&self) -> broadcast::Receiver<PrinterEvent> {
        self.events.subscribe()
    }

    /// Register a listener; events are delivered in order from a
    /// dedicated task
    pub fn register_listener(&self, listener: Arc<dyn PrinterListener>) -> PrinterListenerHandle {
        let id = uuid::Uuid::new_v4().to_string();
        let mut rx = self.events.subscribe();

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => dispatch_to_listener(listener.as_ref(), &event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Listener fell behind; {} event(s) dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.listeners.write().insert(id.clone(), task);
        PrinterListenerHandle(id)
    }

    /// Remove a listener; returns false if the handle was unknown
    pub fn unregister_listener(&self, handle: &PrinterListenerHandle) -> bool {
        match self.listeners.write().remove(&handle.0) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl Drop for PrinterController {
    fn drop(&mut self) {
        for (_, task) in self.listeners.write().drain() {
            task.abort();
        }
    }
}
