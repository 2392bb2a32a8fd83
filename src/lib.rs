//! # PrintKit
//!
//! A Rust host for 3D printers:
//! - Serial connection with a single command queue shared by every user
//! - Periodic temperature and position polling
//! - SD card listing, printing, and deletion
//! - Paced G-code streaming with progress and cancellation
//! - External slicer invocation with a rendered printer profile
//!
//! ## Architecture
//!
//! PrintKit is organized as a workspace with multiple crates:
//!
//! 1. **printkit-core** - Errors, status and profile types, events, listeners
//! 2. **printkit-communication** - Transports, command channel, firmware dialects, printer operations
//! 3. **printkit-settings** - Configuration, validation, persistence
//! 4. **printkit-slicer** - Slicer resolution, profile rendering, slicing jobs
//! 5. **printkit** - This crate: wiring, logging, and the `printkit` binary

pub use printkit_communication::{
    list_ports, ChannelConfig, Capability, CommandChannel, ControllerConfig, FirmwareDialect,
    GcodeStreamer, PollerConfig, PrinterController, SdCardConfig, SdCardSession,
    SerialPortInfo, StatusPoller, StreamConfig, StreamHandle, StreamObserver, Transport,
    TransportFactory, VirtualPrinter, BAUD_RATES, DEFAULT_BAUD_RATE,
};
pub use printkit_core::{
    ChannelError, ConnectionError, ConnectionState, ConsoleDirection, ConsoleLine, Error,
    EventDispatcher, FirmwareKind, Material, PollMode, PrinterEvent, PrinterListener,
    PrinterListenerHandle, PrinterProfile, Result, SdCardError, SdFileEntry, SeamPosition,
    SliceError, SliceEvent, StatusSnapshot, StreamError, StreamEvent, StreamOutcome,
    SupportStyle,
};
pub use printkit_settings::{Config, ConfigError, SettingsError, SettingsManager};
pub use printkit_slicer::{SliceHandle, SliceOptions, SliceRequest, SlicerLocator, SlicingJob};

use std::path::PathBuf;
use std::time::Duration;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging at INFO unless `RUST_LOG` says otherwise
pub fn init_logging() -> anyhow::Result<()> {
    init_logging_with_level(tracing::Level::INFO)
}

/// Initialize logging with a default level
///
/// `RUST_LOG` directives still apply on top. Logs go to stderr so that
/// command output on stdout stays clean.
pub fn init_logging_with_level(level: tracing::Level) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}

/// Controller settings taken from the application config
pub fn controller_config(config: &Config) -> ControllerConfig {
    ControllerConfig {
        firmware: config.firmware.kind,
        open_settle: config.connection.open_settle(),
        channel: ChannelConfig {
            response_settle: config.connection.response_settle(),
            response_timeout: config.connection.response_timeout(),
        },
        poller: PollerConfig {
            idle_interval: Duration::from_secs(config.polling.idle_interval_secs),
            print_interval: Duration::from_secs(config.polling.print_interval_secs),
        },
        sd_card: SdCardConfig {
            listing_settle: Duration::from_millis(config.sd_card.listing_settle_ms),
        },
        stream: StreamConfig {
            line_delay: Duration::from_millis(config.streaming.line_delay_ms),
        },
        disconnect_on_sd_print: config.sd_card.disconnect_on_sd_print,
    }
}

/// Slicer locator honouring the configured executable
pub fn slicer_locator(config: &Config) -> SlicerLocator {
    SlicerLocator::system(config.slicer.executable.clone())
}

/// Slicing request using the configured profile
///
/// The profile's G-code flavor follows the configured firmware.
pub fn slice_request(
    config: &Config,
    input: impl Into<PathBuf>,
    output: Option<PathBuf>,
    options: SliceOptions,
    export_3mf: bool,
) -> SliceRequest {
    let input = input.into();
    let output = output.unwrap_or_else(|| SliceRequest::default_output(&input, export_3mf));

    let mut profile = config.slicer.profile.clone();
    profile.firmware = config.firmware.kind;

    let mut request = SliceRequest::new(input, output, profile);
    request.options = options;
    request.export_3mf = export_3mf;
    request
}
