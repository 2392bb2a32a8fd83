//! # PrintKit Communication
//!
//! Serial communication and printer operations for PrintKit.
//! Provides the serial and simulated transports, the serialized command
//! channel, firmware dialects (Marlin, Klipper, RepRapFirmware), and the
//! printer-side jobs: status polling, SD card management, and G-code
//! streaming, all behind `PrinterController`.

pub mod communication;
pub mod firmware;
pub mod printer;

pub use communication::{
    line_protocol, list_ports, ChannelConfig, CommandChannel, ConnectionParams, Conversation,
    ConversationLease, LogPolicy, SendOptions, SerialPortInfo, SerialTransport,
    SerialTransportFactory, Transport, TransportFactory, VirtualPrinter, BAUD_RATES,
    DEFAULT_BAUD_RATE,
};

pub use firmware::{dialect_for, Capability, FirmwareDialect};

pub use printer::{
    ChannelSlot, ControllerConfig, GcodeStreamer, PollerConfig, PrinterController, SdCardConfig,
    SdCardSession, StatusPoller, StreamConfig, StreamHandle, StreamObserver,
};
