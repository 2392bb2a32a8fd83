//! Printer operations built on the command channel
//!
//! This module provides:
//! - Periodic status polling into a shared snapshot
//! - SD card listing, printing, and deletion
//! - G-code file streaming with progress and cancellation
//! - The `PrinterController` facade that ties them to a connection

pub mod controller;
pub mod sd_card;
pub mod status_poller;
pub mod streamer;

pub use controller::{ControllerConfig, PrinterController};
pub use sd_card::{SdCardConfig, SdCardSession};
pub use status_poller::{PollerConfig, StatusPoller};
pub use streamer::{GcodeStreamer, StreamConfig, StreamHandle, StreamObserver};

use crate::communication::CommandChannel;
use parking_lot::RwLock;
use printkit_core::ChannelError;
use std::sync::Arc;

/// The controller's current channel, shared with the components that
/// send through it
///
/// Components look the channel up per operation, so a reconnect is picked
/// up without rebuilding them.
#[derive(Debug, Clone, Default)]
pub struct ChannelSlot {
    inner: Arc<RwLock<Option<CommandChannel>>>,
}

impl ChannelSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// The open channel, or `NotConnected`
    pub fn get(&self) -> Result<CommandChannel, ChannelError> {
        match &*self.inner.read() {
            Some(channel) if channel.is_open() => Ok(channel.clone()),
            _ => Err(ChannelError::NotConnected),
        }
    }

    /// Install a channel, returning the previous one
    pub fn replace(&self, channel: Option<CommandChannel>) -> Option<CommandChannel> {
        std::mem::replace(&mut *self.inner.write(), channel)
    }

    /// Check whether an open channel is installed
    pub fn is_open(&self) -> bool {
        self.get().is_ok()
    }
}
