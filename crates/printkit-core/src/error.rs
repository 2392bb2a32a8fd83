//! Error handling for PrintKit
//!
//! Provides error types for all layers of the printer host:
//! - Connection errors (serial transport open/read/write)
//! - Channel errors (command submission and response collection)
//! - SD card session errors (soft, user-facing)
//! - Streaming and slicing job errors
//!
//! Reply-grammar misses are not errors: parsers return `Option` and the
//! caller keeps its previous values.
//!
//! All error types use `thiserror` for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

/// Connection error type
///
/// Represents failures of the physical link. Any of these observed on an
/// open connection forces a clean disconnect.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Port not found
    #[error("Port not found: {port}")]
    PortNotFound {
        /// The name of the port that was not found.
        port: String,
    },

    /// Failed to open port
    #[error("Failed to open port {port}: {reason}")]
    FailedToOpen {
        /// The name of the port that failed to open.
        port: String,
        /// The reason the port failed to open.
        reason: String,
    },

    /// Connection lost
    #[error("Connection lost: {reason}")]
    ConnectionLost {
        /// The reason the connection was lost.
        reason: String,
    },

    /// Write to the transport failed
    #[error("Serial write error: {reason}")]
    WriteFailed {
        /// The underlying I/O failure.
        reason: String,
    },

    /// Read from the transport failed
    #[error("Serial read error: {reason}")]
    ReadFailed {
        /// The underlying I/O failure.
        reason: String,
    },

    /// Baud rate not supported
    #[error("Baud rate {baud} not supported")]
    UnsupportedBaudRate {
        /// The unsupported baud rate.
        baud: u32,
    },

    /// Invalid connection parameters
    #[error("Invalid connection parameters: {reason}")]
    InvalidParameters {
        /// The reason the parameters are invalid.
        reason: String,
    },
}

/// Command channel error type
#[derive(Error, Debug, Clone)]
pub enum ChannelError {
    /// No open connection; the transport was not touched
    #[error("Printer not connected")]
    NotConnected,

    /// The connection failed while the command was in flight
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Another conversation owns the channel
    #[error("Channel busy: {owner} conversation in progress")]
    Busy {
        /// The conversation currently holding the channel.
        owner: String,
    },
}

/// SD card session error type
///
/// Every variant carries a message suitable for showing to the user.
#[derive(Error, Debug, Clone)]
pub enum SdCardError {
    /// Session used while disconnected
    #[error("Printer not connected.")]
    NotConnected,

    /// No file is selected
    #[error("No SD file selected.")]
    NoSelection,

    /// The requested file is not part of the current listing
    #[error("File not on SD card: {name}")]
    UnknownFile {
        /// The requested file name.
        name: String,
    },

    /// A destructive action was requested without confirmation
    #[error("Deleting {name} requires confirmation.")]
    NotConfirmed {
        /// The file that would have been deleted.
        name: String,
    },

    /// The firmware dialect has no SD support
    #[error("SD card not supported by {firmware}")]
    Unsupported {
        /// The firmware dialect name.
        firmware: String,
    },

    /// The underlying channel failed
    #[error("SD card command failed: {0}")]
    Channel(ChannelError),
}

impl From<ChannelError> for SdCardError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::NotConnected => SdCardError::NotConnected,
            other => SdCardError::Channel(other),
        }
    }
}

/// G-code streaming error type
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    /// The source file could not be read
    #[error("Cannot read {path}: {reason}")]
    FileUnreadable {
        /// The G-code file path.
        path: PathBuf,
        /// The underlying I/O failure.
        reason: String,
    },

    /// A stream is already running
    #[error("A stream job is already running")]
    AlreadyRunning,

    /// The channel failed mid-stream
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Slicing job error type
#[derive(Error, Debug, Clone)]
pub enum SliceError {
    /// No slicer executable could be resolved; nothing was spawned
    #[error("Slicer executable not found (tried: {})", searched.join(", "))]
    ToolNotFound {
        /// The candidates that were checked.
        searched: Vec<String>,
    },

    /// The input model does not exist or has an unsupported extension
    #[error("Invalid model file {path}: {reason}")]
    InvalidModel {
        /// The model path.
        path: PathBuf,
        /// The reason it was rejected.
        reason: String,
    },

    /// The temporary profile could not be written
    #[error("Failed to write slicer profile: {reason}")]
    Profile {
        /// The underlying I/O failure.
        reason: String,
    },

    /// The subprocess could not be started
    #[error("Failed to run slicer: {reason}")]
    Spawn {
        /// The underlying I/O failure.
        reason: String,
    },

    /// The subprocess exited unsuccessfully
    #[error("Slicer exited with code {exit_code:?}")]
    SubprocessFailure {
        /// The exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
        /// Captured combined stdout/stderr.
        output: String,
    },
}

/// Main error type for PrintKit
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Channel error
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// SD card error
    #[error(transparent)]
    SdCard(#[from] SdCardError),

    /// Streaming error
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Slicing error
    #[error(transparent)]
    Slice(#[from] SliceError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a "not connected" report
    pub fn is_not_connected(&self) -> bool {
        matches!(
            self,
            Error::Channel(ChannelError::NotConnected) | Error::SdCard(SdCardError::NotConnected)
        )
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::Channel(ChannelError::Connection(_))
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_connected_maps_to_sd_not_connected() {
        let err: SdCardError = ChannelError::NotConnected.into();
        assert!(matches!(err, SdCardError::NotConnected));
        assert_eq!(err.to_string(), "Printer not connected.");
    }

    #[test]
    fn test_tool_not_found_lists_candidates() {
        let err = SliceError::ToolNotFound {
            searched: vec!["prusa-slicer".into(), "prusa_slicer".into()],
        };
        assert_eq!(
            err.to_string(),
            "Slicer executable not found (tried: prusa-slicer, prusa_slicer)"
        );
    }

    #[test]
    fn test_error_classification() {
        let err: Error = ChannelError::NotConnected.into();
        assert!(err.is_not_connected());
        assert!(!err.is_connection_error());

        let err: Error = ChannelError::Connection(ConnectionError::WriteFailed {
            reason: "broken pipe".into(),
        })
        .into();
        assert!(err.is_connection_error());
    }
}
