//! Serialized command channel
//!
//! A single consumer task owns the transport. Callers submit envelopes
//! over a bounded queue and await a oneshot reply; the consumer finishes
//! one envelope (write plus response collection) before it looks at the
//! next, so bytes from different callers never interleave on the wire.
//!
//! Replies are only meaningful when no other caller is mid-exchange, so
//! every normal send first takes the conversation lease. Multi-command
//! exchanges hold one lease across all of their steps.
//!
//! Emergency stops travel on a separate priority queue that the consumer
//! always services first and never wait for a lease.

use super::line_protocol::{self, DEFAULT_RESPONSE_SETTLE, DEFAULT_RESPONSE_TIMEOUT};
use super::Transport;
use parking_lot::{Mutex, RwLock};
use printkit_core::{
    ChannelError, ConnectionError, ConnectionState, ConsoleDirection, EventDispatcher,
    PrinterEvent,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Depth of the normal command queue
const COMMAND_QUEUE_SIZE: usize = 64;

/// How a command's traffic is logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogPolicy {
    /// Publish SENT/RECV console lines
    #[default]
    Console,
    /// Trace only (status polling)
    Quiet,
}

/// Per-command options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Wait for and return the printer's reply
    pub expect_response: bool,
    /// Console logging
    pub log: LogPolicy,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            expect_response: true,
            log: LogPolicy::Console,
        }
    }
}

impl SendOptions {
    /// Wait for the reply and log it to the console
    pub fn console() -> Self {
        Self::default()
    }

    /// Wait for the reply without console logging
    pub fn quiet() -> Self {
        Self {
            expect_response: true,
            log: LogPolicy::Quiet,
        }
    }

    /// Write only; do not wait for a reply
    pub fn fire_and_forget() -> Self {
        Self {
            expect_response: false,
            log: LogPolicy::Quiet,
        }
    }
}

/// Multi-command exchanges that need the channel to themselves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversation {
    /// Temperature and position query pair
    StatusPoll,
    /// SD card mount, list, and drain
    SdListing,
    /// SD select, start, or delete
    SdCommand,
    /// A single command sent outside any other exchange
    Manual,
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusPoll => write!(f, "status poll"),
            Self::SdListing => write!(f, "SD listing"),
            Self::SdCommand => write!(f, "SD command"),
            Self::Manual => write!(f, "manual command"),
        }
    }
}

/// Exclusive ownership of the channel for one conversation
///
/// Released on drop. Commands belonging to the conversation go through
/// the lease; plain [`CommandChannel::send`] calls wait until it is gone.
pub struct ConversationLease {
    channel: CommandChannel,
    owner: Arc<RwLock<Option<Conversation>>>,
    conversation: Conversation,
    _guard: OwnedMutexGuard<()>,
}

impl ConversationLease {
    /// The conversation holding this lease
    pub fn conversation(&self) -> Conversation {
        self.conversation
    }

    /// Send a command as part of this conversation
    pub async fn send(&self, command: &str, options: SendOptions) -> Reply {
        self.channel
            .submit(
                Request::Send {
                    command: command.to_string(),
                    options,
                },
                false,
            )
            .await
    }

    /// Read whatever the printer has buffered as part of this conversation
    pub async fn drain(&self) -> Result<String, ChannelError> {
        Ok(self
            .channel
            .submit(Request::Drain, false)
            .await?
            .unwrap_or_default())
    }
}

impl Drop for ConversationLease {
    fn drop(&mut self) {
        *self.owner.write() = None;
    }
}

impl fmt::Debug for ConversationLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationLease")
            .field("conversation", &self.conversation)
            .finish()
    }
}

/// Response timing for the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Pause between a write and the first read
    pub response_settle: Duration,
    /// Upper bound on response collection
    pub response_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            response_settle: DEFAULT_RESPONSE_SETTLE,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

#[derive(Debug)]
enum Request {
    Send {
        command: String,
        options: SendOptions,
    },
    Drain,
}

type Reply = Result<Option<String>, ChannelError>;

struct Envelope {
    request: Request,
    response_tx: oneshot::Sender<Reply>,
}

struct Shared {
    port: String,
    normal_tx: mpsc::Sender<Envelope>,
    priority_tx: mpsc::UnboundedSender<Envelope>,
    closed: CancellationToken,
    conversation: Arc<tokio::sync::Mutex<()>>,
    owner: Arc<RwLock<Option<Conversation>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the serialized command channel
///
/// Cheap to clone; every clone talks to the same consumer task.
#[derive(Clone)]
pub struct CommandChannel {
    shared: Arc<Shared>,
}

impl fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandChannel")
            .field("port", &self.shared.port)
            .field("open", &self.is_open())
            .finish()
    }
}

impl CommandChannel {
    /// Take ownership of an open transport and start the consumer task
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        transport: Box<dyn Transport>,
        config: ChannelConfig,
        events: EventDispatcher,
    ) -> Self {
        let (normal_tx, normal_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let (priority_tx, priority_rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        let shared = Arc::new(Shared {
            port: transport.name(),
            normal_tx,
            priority_tx,
            closed: closed.clone(),
            conversation: Arc::new(tokio::sync::Mutex::new(())),
            owner: Arc::new(RwLock::new(None)),
            consumer: Mutex::new(None),
        });

        let consumer = Consumer {
            transport,
            config,
            events,
            closed,
        };
        let handle = tokio::spawn(consumer.run(normal_rx, priority_rx));
        *shared.consumer.lock() = Some(handle);

        Self { shared }
    }

    /// Port name of the underlying transport
    pub fn port(&self) -> &str {
        &self.shared.port
    }

    /// Check whether commands are accepted
    pub fn is_open(&self) -> bool {
        !self.shared.closed.is_cancelled()
    }

    /// Token cancelled once the channel closes for any reason
    pub fn closed_token(&self) -> CancellationToken {
        self.shared.closed.clone()
    }

    /// Send a command
    ///
    /// Waits for any active conversation to finish first. Returns
    /// `Ok(None)` when no response was requested.
    pub async fn send(&self, command: &str, options: SendOptions) -> Reply {
        if !self.is_open() {
            return Err(ChannelError::NotConnected);
        }
        self.acquire(Conversation::Manual)
            .await
            .send(command, options)
            .await
    }

    /// Send a command ahead of everything already queued
    pub async fn send_priority(&self, command: &str, options: SendOptions) -> Reply {
        self.submit(
            Request::Send {
                command: command.to_string(),
                options,
            },
            true,
        )
        .await
    }

    /// Read whatever the printer has buffered without writing
    pub async fn drain(&self) -> Result<String, ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::NotConnected);
        }
        self.acquire(Conversation::Manual).await.drain().await
    }

    async fn submit(&self, request: Request, priority: bool) -> Reply {
        if !self.is_open() {
            return Err(ChannelError::NotConnected);
        }

        let (response_tx, response_rx) = oneshot::channel();
        let envelope = Envelope {
            request,
            response_tx,
        };

        if priority {
            self.shared
                .priority_tx
                .send(envelope)
                .map_err(|_| ChannelError::NotConnected)?;
        } else {
            self.shared
                .normal_tx
                .send(envelope)
                .await
                .map_err(|_| ChannelError::NotConnected)?;
        }

        // A dropped reply means the consumer shut down with this queued
        response_rx.await.unwrap_or(Err(ChannelError::NotConnected))
    }

    /// Wait for exclusive ownership of the channel
    pub async fn acquire(&self, conversation: Conversation) -> ConversationLease {
        let guard = self.shared.conversation.clone().lock_owned().await;
        self.grant(conversation, guard)
    }

    /// Take exclusive ownership if nobody holds it
    pub fn try_acquire(
        &self,
        conversation: Conversation,
    ) -> Result<ConversationLease, ChannelError> {
        match self.shared.conversation.clone().try_lock_owned() {
            Ok(guard) => Ok(self.grant(conversation, guard)),
            Err(_) => Err(ChannelError::Busy {
                owner: self
                    .current_conversation()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "another".to_string()),
            }),
        }
    }

    fn grant(&self, conversation: Conversation, guard: OwnedMutexGuard<()>) -> ConversationLease {
        *self.shared.owner.write() = Some(conversation);
        ConversationLease {
            channel: self.clone(),
            owner: self.shared.owner.clone(),
            conversation,
            _guard: guard,
        }
    }

    /// Conversation currently holding the channel, if any
    pub fn current_conversation(&self) -> Option<Conversation> {
        *self.shared.owner.read()
    }

    /// Close the channel and wait for the transport to be released
    ///
    /// Queued requests fail with `NotConnected`.
    pub async fn close(&self) {
        self.shared.closed.cancel();
        let handle = self.shared.consumer.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Command consumer for {} ended abnormally: {}", self.port(), e);
            }
        }
    }
}

/// The task that owns the transport
struct Consumer {
    transport: Box<dyn Transport>,
    config: ChannelConfig,
    events: EventDispatcher,
    closed: CancellationToken,
}

impl Consumer {
    async fn run(
        mut self,
        mut normal_rx: mpsc::Receiver<Envelope>,
        mut priority_rx: mpsc::UnboundedReceiver<Envelope>,
    ) {
        let port = self.transport.name();
        tracing::debug!("Command consumer for {} started", port);

        loop {
            let envelope = tokio::select! {
                biased;
                () = self.closed.cancelled() => break,
                Some(envelope) = priority_rx.recv() => envelope,
                Some(envelope) = normal_rx.recv() => envelope,
                else => break,
            };

            match self.process(envelope.request).await {
                Err(ChannelError::Connection(err)) => {
                    self.fail(&err, &mut normal_rx, &mut priority_rx);
                    let _ = envelope.response_tx.send(Err(ChannelError::Connection(err)));
                    break;
                }
                result => {
                    let _ = envelope.response_tx.send(result);
                }
            }
        }

        if let Err(e) = self.transport.close() {
            tracing::warn!("Error closing {}: {}", port, e);
        }
        tracing::debug!("Command consumer for {} stopped", port);
    }

    async fn process(&mut self, request: Request) -> Reply {
        match request {
            Request::Send { command, options } => self.send(&command, options).await,
            Request::Drain => {
                let text = line_protocol::drain(self.transport.as_mut()).map_err(|e| {
                    ConnectionError::ReadFailed {
                        reason: e.to_string(),
                    }
                })?;
                Ok(Some(text))
            }
        }
    }

    async fn send(&mut self, command: &str, options: SendOptions) -> Reply {
        let framed = line_protocol::frame(command);
        let shown = String::from_utf8_lossy(&framed[..framed.len() - 1]).into_owned();

        self.transport
            .write_bytes(&framed)
            .map_err(|e| ConnectionError::WriteFailed {
                reason: e.to_string(),
            })?;
        tracing::debug!("SENT: {}", shown);
        if options.log == LogPolicy::Console {
            self.events.console(ConsoleDirection::Sent, shown);
        }

        if !options.expect_response {
            return Ok(None);
        }

        let response = line_protocol::collect_response(
            self.transport.as_mut(),
            self.config.response_settle,
            self.config.response_timeout,
        )
        .await
        .map_err(|e| ConnectionError::ReadFailed {
            reason: e.to_string(),
        })?;

        let trimmed = response.trim();
        if !trimmed.is_empty() {
            tracing::debug!("RECV: {}", trimmed);
            if options.log == LogPolicy::Console {
                self.events.console(ConsoleDirection::Received, trimmed);
            }
        }
        Ok(Some(response))
    }

    /// Forced disconnect after an I/O failure
    fn fail(
        &mut self,
        err: &ConnectionError,
        normal_rx: &mut mpsc::Receiver<Envelope>,
        priority_rx: &mut mpsc::UnboundedReceiver<Envelope>,
    ) {
        tracing::error!("Connection to {} failed: {}", self.transport.name(), err);
        self.closed.cancel();

        normal_rx.close();
        priority_rx.close();
        while let Ok(envelope) = priority_rx.try_recv() {
            let _ = envelope
                .response_tx
                .send(Err(ChannelError::Connection(err.clone())));
        }
        while let Ok(envelope) = normal_rx.try_recv() {
            let _ = envelope
                .response_tx
                .send(Err(ChannelError::Connection(err.clone())));
        }

        self.events
            .console(ConsoleDirection::Info, format!("Connection lost: {}", err));
        self.events.publish(PrinterEvent::Error(err.to_string()));
        self.events
            .publish(PrinterEvent::ConnectionChanged(ConnectionState::Disconnected));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::VirtualPrinter;

    fn fast_config() -> ChannelConfig {
        ChannelConfig {
            response_settle: Duration::from_millis(1),
            response_timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_send_returns_reply() {
        let printer = VirtualPrinter::new();
        let channel = CommandChannel::open(
            Box::new(printer.clone()),
            fast_config(),
            EventDispatcher::default(),
        );

        let reply = channel.send("M105", SendOptions::quiet()).await.unwrap();
        assert!(reply.unwrap().contains("T:"));
        assert_eq!(printer.written_lines(), vec!["M105"]);
        channel.close().await;
        assert!(printer.is_closed());
    }

    #[tokio::test]
    async fn test_closed_channel_reports_not_connected() {
        let printer = VirtualPrinter::new();
        let channel = CommandChannel::open(
            Box::new(printer.clone()),
            fast_config(),
            EventDispatcher::default(),
        );
        channel.close().await;
        let calls = printer.io_calls();

        let err = channel.send("G28", SendOptions::console()).await.unwrap_err();
        assert!(matches!(err, ChannelError::NotConnected));
        assert_eq!(printer.io_calls(), calls);
    }

    #[tokio::test]
    async fn test_try_acquire_reports_owner() {
        let channel = CommandChannel::open(
            Box::new(VirtualPrinter::new()),
            fast_config(),
            EventDispatcher::default(),
        );

        let lease = channel.acquire(Conversation::SdListing).await;
        assert_eq!(channel.current_conversation(), Some(Conversation::SdListing));
        match channel.try_acquire(Conversation::StatusPoll) {
            Err(ChannelError::Busy { owner }) => assert_eq!(owner, "SD listing"),
            other => panic!("expected Busy, got {:?}", other),
        }

        drop(lease);
        assert_eq!(channel.current_conversation(), None);
        assert!(channel.try_acquire(Conversation::StatusPoll).is_ok());
        channel.close().await;
    }

    #[tokio::test]
    async fn test_send_waits_for_active_conversation() {
        let printer = VirtualPrinter::new();
        let channel = CommandChannel::open(
            Box::new(printer.clone()),
            fast_config(),
            EventDispatcher::default(),
        );

        let lease = channel.acquire(Conversation::SdListing).await;
        let manual = tokio::spawn({
            let channel = channel.clone();
            async move { channel.send("G28", SendOptions::quiet()).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!manual.is_finished());

        lease.send("M20", SendOptions::quiet()).await.unwrap();
        let extra = lease.drain().await.unwrap();
        assert!(extra.is_empty());
        drop(lease);

        let reply = manual.await.unwrap().unwrap().unwrap();
        assert!(!reply.contains("file list"));
        assert_eq!(printer.written_lines(), vec!["M20", "G28"]);
        channel.close().await;
    }

    #[tokio::test]
    async fn test_priority_send_ignores_conversation() {
        let printer = VirtualPrinter::new();
        let channel = CommandChannel::open(
            Box::new(printer.clone()),
            fast_config(),
            EventDispatcher::default(),
        );

        let _lease = channel.acquire(Conversation::SdListing).await;
        channel
            .send_priority("M112", SendOptions::fire_and_forget())
            .await
            .unwrap();
        assert_eq!(printer.written_lines(), vec!["M112"]);
        channel.close().await;
    }

    #[tokio::test]
    async fn test_write_failure_forces_disconnect() {
        let printer = VirtualPrinter::new();
        let events = EventDispatcher::default();
        let mut rx = events.subscribe();
        let channel = CommandChannel::open(Box::new(printer.clone()), fast_config(), events);

        printer.set_disconnected(true);
        let err = channel.send("M105", SendOptions::quiet()).await.unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Connection(ConnectionError::WriteFailed { .. })
        ));
        assert!(!channel.is_open());

        let mut saw_disconnect = false;
        while let Ok(event) = rx.try_recv() {
            if let PrinterEvent::ConnectionChanged(ConnectionState::Disconnected) = event {
                saw_disconnect = true;
            }
        }
        assert!(saw_disconnect);
    }
}
