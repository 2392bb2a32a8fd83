//! Printer link: transports, line framing, and the command channel
//!
//! Provides:
//! - The `Transport` trait and its serial and simulated implementations
//! - Connection parameters and transport factories
//! - Line framing and settle-based response collection
//! - The serialized `CommandChannel`

pub mod channel;
pub mod line_protocol;
pub mod serial;
pub mod virtual_port;

pub use channel::{
    ChannelConfig, CommandChannel, Conversation, ConversationLease, LogPolicy, SendOptions,
};
pub use serial::{list_ports, SerialPortInfo, SerialTransport, SerialTransportFactory};
pub use virtual_port::VirtualPrinter;

use printkit_core::ConnectionError;
use std::io;
use std::time::Duration;

/// Baud rates offered to the user, most common first
pub const BAUD_RATES: [u32; 4] = [115200, 250000, 230400, 9600];

/// Default baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Serial connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Port name (e.g. "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout used by the underlying port (ms)
    pub read_timeout_ms: u64,
    /// Assert DTR after opening
    pub dtr: bool,
    /// Assert RTS after opening
    pub rts: bool,
    /// Firmware settle delay after opening (ms)
    pub open_settle_ms: u64,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 10,
            dtr: false,
            rts: false,
            open_settle_ms: 2000,
        }
    }
}

impl ConnectionParams {
    /// Parameters for a port and baud rate with default timing
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            ..Self::default()
        }
    }

    /// Set the firmware settle delay
    pub fn with_open_settle(mut self, settle: Duration) -> Self {
        self.open_settle_ms = settle.as_millis() as u64;
        self
    }

    /// Firmware settle delay as a duration
    pub fn open_settle(&self) -> Duration {
        Duration::from_millis(self.open_settle_ms)
    }

    /// Validate parameters
    pub fn validate(&self) -> Result<(), ConnectionError> {
        if self.port.trim().is_empty() {
            return Err(ConnectionError::InvalidParameters {
                reason: "Port name must not be empty".to_string(),
            });
        }
        if self.baud_rate == 0 {
            return Err(ConnectionError::UnsupportedBaudRate {
                baud: self.baud_rate,
            });
        }
        Ok(())
    }
}

/// Byte-level link to the printer
///
/// Implementations never block for longer than their short read timeout:
/// `read_available` returns an empty buffer when nothing is waiting.
pub trait Transport: Send {
    /// Write all bytes to the printer
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read whatever the printer has buffered
    fn read_available(&mut self) -> io::Result<Vec<u8>>;

    /// Close the link
    fn close(&mut self) -> io::Result<()>;

    /// Port name this transport is attached to
    fn name(&self) -> String;
}

/// Opens transports for a set of connection parameters
pub trait TransportFactory: Send + Sync {
    /// Open a new transport
    fn open(&self, params: &ConnectionParams) -> Result<Box<dyn Transport>, ConnectionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = ConnectionParams::new("/dev/ttyUSB0", 250000);
        assert_eq!(params.baud_rate, 250000);
        assert!(!params.dtr && !params.rts);
        assert_eq!(params.open_settle(), Duration::from_secs(2));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_empty_port_rejected() {
        let params = ConnectionParams::new("  ", 115200);
        assert!(matches!(
            params.validate(),
            Err(ConnectionError::InvalidParameters { .. })
        ));
    }
}
