//! Printer-facing abstractions: events and listeners

pub mod event;
pub mod listener;

pub use event::{
    ConsoleDirection, ConsoleLine, EventDispatcher, PrinterEvent, SliceEvent, SliceSuccess,
    StreamEvent, StreamOutcome,
};
pub use listener::{dispatch_to_listener, PrinterListener, PrinterListenerHandle};
