//! # PrintKit Core
//!
//! Core types, errors, and events for PrintKit.
//! Provides the status and profile data model, the error taxonomy shared
//! by every layer, and the event dispatcher/listener plumbing UI
//! collaborators observe.

pub mod core;
pub mod data;
pub mod error;
pub mod types;

pub use core::{
    dispatch_to_listener, ConsoleDirection, ConsoleLine, EventDispatcher, PrinterEvent,
    PrinterListener, PrinterListenerHandle, SliceEvent, SliceSuccess, StreamEvent,
    StreamOutcome,
};

pub use data::{
    ConnectionState, FirmwareKind, Material, MaterialPreset, PollMode, Position, PrinterProfile,
    SdFileEntry, SeamPosition, StatusSnapshot, SupportStyle, Temperature, TemperatureReport,
};

pub use error::{
    ChannelError, ConnectionError, Error, Result, SdCardError, SliceError, StreamError,
};

pub use types::{
    thread_safe, thread_safe_none, thread_safe_rw, DataCallback, ThreadSafe, ThreadSafeOption,
    ThreadSafeRw,
};
