//! Event system for printer communication
//!
//! Provides:
//! - Event types for connection, telemetry, SD card, and job changes
//! - Event dispatcher for publishing events to subscribers

use crate::data::{ConnectionState, PollMode, SdFileEntry, StatusSnapshot};
use crate::error::SliceError;
use chrono::{DateTime, Local};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::broadcast;

/// Direction of a console line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleDirection {
    /// Command written to the printer
    Sent,
    /// Reply read from the printer
    Received,
    /// Host-side notice (connect, disconnect, errors)
    Info,
}

/// One line of the printer console log
#[derive(Debug, Clone)]
pub struct ConsoleLine {
    /// When the line was produced
    pub timestamp: DateTime<Local>,
    /// Which way the data went
    pub direction: ConsoleDirection,
    /// The text itself
    pub text: String,
}

impl ConsoleLine {
    /// Create a console line stamped with the current time
    pub fn new(direction: ConsoleDirection, text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            direction,
            text: text.into(),
        }
    }
}

impl fmt::Display for ConsoleLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.direction {
            ConsoleDirection::Sent => "SENT: ",
            ConsoleDirection::Received => "RECV: ",
            ConsoleDirection::Info => "*** ",
        };
        write!(f, "[{}] {}{}", self.timestamp.format("%H:%M:%S"), prefix, self.text)
    }
}

/// How a streaming job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Every line was sent
    Completed {
        /// Lines written to the printer
        lines_sent: usize,
    },
    /// The job was cancelled before the end of the file
    Cancelled {
        /// Lines written before cancellation
        lines_sent: usize,
    },
    /// The job could not continue
    Failed {
        /// Lines written before the failure
        lines_sent: usize,
        /// What went wrong
        reason: String,
    },
}

impl StreamOutcome {
    /// Lines written regardless of outcome
    pub fn lines_sent(&self) -> usize {
        match self {
            Self::Completed { lines_sent }
            | Self::Cancelled { lines_sent }
            | Self::Failed { lines_sent, .. } => *lines_sent,
        }
    }
}

/// Progress and completion of a G-code stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Emitted after each line is written
    Progress {
        /// Lines written so far
        lines_sent: usize,
        /// Non-blank lines in the file
        total_lines: usize,
        /// `lines_sent / total_lines`, 0-100
        percent: f64,
    },
    /// Emitted exactly once when the job ends
    Finished(StreamOutcome),
}

/// Progress and completion of a slicer run
#[derive(Debug, Clone)]
pub enum SliceEvent {
    /// One line of combined stdout/stderr
    Output(String),
    /// Emitted exactly once when the job ends
    Finished(Result<SliceSuccess, SliceError>),
}

/// A slicer run that exited successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceSuccess {
    /// File the slicer wrote
    pub output: PathBuf,
    /// Process exit code (absent when killed by a signal)
    pub exit_code: Option<i32>,
    /// Combined stdout/stderr, one line per row
    pub captured_output: String,
}

/// Printer event types
#[derive(Debug, Clone)]
pub enum PrinterEvent {
    /// Connection state changed
    ConnectionChanged(ConnectionState),
    /// New telemetry was parsed
    StatusUpdated(StatusSnapshot),
    /// Poll cadence changed
    PollModeChanged(PollMode),
    /// SD card listing refreshed
    SdListingUpdated(Vec<SdFileEntry>),
    /// Streaming job progress or completion
    Stream(StreamEvent),
    /// Slicer output or completion
    Slice(SliceEvent),
    /// Console traffic
    Console(ConsoleLine),
    /// Error occurred
    Error(String),
}

impl fmt::Display for PrinterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrinterEvent::ConnectionChanged(state) => write!(f, "{}", state),
            PrinterEvent::StatusUpdated(snapshot) => write!(f, "Status: {}", snapshot),
            PrinterEvent::PollModeChanged(mode) => write!(f, "Polling: {}", mode),
            PrinterEvent::SdListingUpdated(entries) => {
                write!(f, "SD listing: {} file(s)", entries.len())
            }
            PrinterEvent::Stream(StreamEvent::Progress { percent, .. }) => {
                write!(f, "Streaming: {:.0}%", percent)
            }
            PrinterEvent::Stream(StreamEvent::Finished(outcome)) => {
                write!(f, "Streaming finished: {:?}", outcome)
            }
            PrinterEvent::Slice(SliceEvent::Output(line)) => write!(f, "Slicer: {}", line),
            PrinterEvent::Slice(SliceEvent::Finished(Ok(success))) => {
                write!(f, "Slicing complete: {}", success.output.display())
            }
            PrinterEvent::Slice(SliceEvent::Finished(Err(e))) => {
                write!(f, "Slicing failed: {}", e)
            }
            PrinterEvent::Console(line) => write!(f, "{}", line),
            PrinterEvent::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Event dispatcher for publishing events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for printer events.
    tx: broadcast::Sender<PrinterEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 256)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size);
        Self { tx }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PrinterEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers that received it; having none is
    /// not an error.
    pub fn publish(&self, event: PrinterEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!("No subscribers for event: {}", event);
                0
            }
        }
    }

    /// Publish a console line
    pub fn console(&self, direction: ConsoleDirection, text: impl Into<String>) {
        self.publish(PrinterEvent::Console(ConsoleLine::new(direction, text)));
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(256)
    }
}
