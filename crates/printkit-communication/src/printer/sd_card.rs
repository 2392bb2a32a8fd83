//! SD card session
//!
//! Lists, selects, prints, and deletes files on the printer's SD card.
//! Every failure is a soft `SdCardError` with a message fit for the user.

use super::ChannelSlot;
use crate::communication::{Conversation, SendOptions};
use crate::firmware::{Capability, FirmwareDialect};
use parking_lot::Mutex;
use printkit_core::{EventDispatcher, PrinterEvent, SdCardError, SdFileEntry};
use std::sync::Arc;
use std::time::Duration;

/// SD card timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdCardConfig {
    /// Wait between requesting a listing and reading it
    pub listing_settle: Duration,
}

impl Default for SdCardConfig {
    fn default() -> Self {
        Self {
            listing_settle: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
struct SdState {
    entries: Vec<SdFileEntry>,
    selected: Option<String>,
}

/// Handle to the SD card of the connected printer
///
/// Clones share the same listing and selection.
#[derive(Clone)]
pub struct SdCardSession {
    slot: ChannelSlot,
    dialect: Arc<dyn FirmwareDialect>,
    config: SdCardConfig,
    events: EventDispatcher,
    state: Arc<Mutex<SdState>>,
}

impl SdCardSession {
    /// Create a session over a channel slot
    pub fn new(
        slot: ChannelSlot,
        dialect: Arc<dyn FirmwareDialect>,
        config: SdCardConfig,
        events: EventDispatcher,
    ) -> Self {
        Self {
            slot,
            dialect,
            config,
            events,
            state: Arc::new(Mutex::new(SdState::default())),
        }
    }

    /// Re-read the card's file list
    ///
    /// Replaces the previous listing. The selection survives only if the
    /// selected file is still present.
    pub async fn refresh(&self) -> Result<Vec<SdFileEntry>, SdCardError> {
        let channel = self.slot.get()?;
        if !self.dialect.supports(Capability::SdCard) {
            return Err(SdCardError::Unsupported {
                firmware: self.dialect.kind().to_string(),
            });
        }

        let listing = {
            let lease = channel.acquire(Conversation::SdListing).await;
            if let Some(mount) = self.dialect.sd_mount() {
                lease.send(mount, SendOptions::console()).await?;
            }
            lease
                .send(
                    self.dialect.sd_list(),
                    SendOptions {
                        expect_response: false,
                        ..SendOptions::console()
                    },
                )
                .await?;
            tracing::debug!("Waiting {:?} for the SD listing", self.config.listing_settle);
            tokio::time::sleep(self.config.listing_settle).await;
            let listing = lease.drain().await?;
            listing
        };

        let entries = self.dialect.parse_sd_listing(&listing);
        tracing::info!("SD card lists {} G-code file(s)", entries.len());

        {
            let mut state = self.state.lock();
            let still_listed = state
                .selected
                .as_ref()
                .is_some_and(|name| entries.iter().any(|e| &e.filename == name));
            if !still_listed {
                state.selected = None;
            }
            state.entries = entries.clone();
        }
        self.events
            .publish(PrinterEvent::SdListingUpdated(entries.clone()));
        Ok(entries)
    }

    /// Files from the last refresh
    pub fn entries(&self) -> Vec<SdFileEntry> {
        self.state.lock().entries.clone()
    }

    /// Select a listed file by name
    pub fn select(&self, filename: &str) -> Result<(), SdCardError> {
        let mut state = self.state.lock();
        let known = state.entries.iter().any(|e| e.filename == filename);
        if !known {
            return Err(SdCardError::UnknownFile {
                name: filename.to_string(),
            });
        }
        state.selected = Some(filename.to_string());
        Ok(())
    }

    /// Select a listed file by position
    pub fn select_index(&self, index: usize) -> Result<String, SdCardError> {
        let mut state = self.state.lock();
        let filename = state
            .entries
            .get(index)
            .map(|e| e.filename.clone())
            .ok_or_else(|| SdCardError::UnknownFile {
                name: format!("#{}", index),
            })?;
        state.selected = Some(filename.clone());
        Ok(filename)
    }

    /// Currently selected file
    pub fn selected(&self) -> Option<String> {
        self.state.lock().selected.clone()
    }

    /// Start printing the selected file
    pub async fn start_print(&self) -> Result<String, SdCardError> {
        let channel = self.slot.get()?;
        let filename = self.selected().ok_or(SdCardError::NoSelection)?;

        let lease = channel.acquire(Conversation::SdCommand).await;
        lease
            .send(&self.dialect.sd_select(&filename), SendOptions::console())
            .await?;
        lease
            .send(self.dialect.sd_start(), SendOptions::console())
            .await?;
        tracing::info!("Started SD print of {}", filename);
        Ok(filename)
    }

    /// Delete the selected file, then refresh the listing
    ///
    /// Nothing is sent unless `confirmed` is true.
    pub async fn delete_selected(&self, confirmed: bool) -> Result<Vec<SdFileEntry>, SdCardError> {
        let channel = self.slot.get()?;
        let filename = self.selected().ok_or(SdCardError::NoSelection)?;
        if !confirmed {
            return Err(SdCardError::NotConfirmed { name: filename });
        }

        channel
            .acquire(Conversation::SdCommand)
            .await
            .send(&self.dialect.sd_delete(&filename), SendOptions::console())
            .await?;
        tracing::info!("Deleted {} from the SD card", filename);
        self.state.lock().selected = None;
        self.refresh().await
    }

    /// Forget the listing and selection
    pub fn clear(&self) {
        *self.state.lock() = SdState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::{ChannelConfig, CommandChannel, VirtualPrinter};
    use crate::firmware::MarlinDialect;

    fn session_for(printer: &VirtualPrinter) -> (SdCardSession, CommandChannel) {
        let slot = ChannelSlot::new();
        let channel = CommandChannel::open(
            Box::new(printer.clone()),
            ChannelConfig {
                response_settle: Duration::from_millis(1),
                response_timeout: Duration::from_millis(50),
            },
            EventDispatcher::default(),
        );
        slot.replace(Some(channel.clone()));
        let session = SdCardSession::new(
            slot,
            Arc::new(MarlinDialect),
            SdCardConfig {
                listing_settle: Duration::from_millis(1),
            },
            EventDispatcher::default(),
        );
        (session, channel)
    }

    #[tokio::test]
    async fn test_refresh_lists_gcode_files() {
        let printer = VirtualPrinter::new().with_sd_files(&[("a.gcode", 10), ("b.txt", 5)]);
        let (session, channel) = session_for(&printer);

        let entries = session.refresh().await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["a.gcode"]);
        assert_eq!(printer.written_lines(), vec!["M21", "M20"]);
        channel.close().await;
    }

    #[tokio::test]
    async fn test_print_requires_selection() {
        let printer = VirtualPrinter::new();
        let (session, channel) = session_for(&printer);
        session.refresh().await.unwrap();

        assert!(matches!(
            session.start_print().await,
            Err(SdCardError::NoSelection)
        ));
        assert_eq!(session.select_index(1).unwrap(), "cube.gcode");
        assert_eq!(session.start_print().await.unwrap(), "cube.gcode");
        assert!(printer.is_printing());
        let lines = printer.written_lines();
        assert_eq!(&lines[lines.len() - 2..], ["M23 cube.gcode", "M24"]);
        channel.close().await;
    }

    #[tokio::test]
    async fn test_delete_needs_confirmation() {
        let printer = VirtualPrinter::new();
        let (session, channel) = session_for(&printer);
        session.refresh().await.unwrap();
        session.select("cube.gcode").unwrap();

        let err = session.delete_selected(false).await.unwrap_err();
        assert_eq!(err.to_string(), "Deleting cube.gcode requires confirmation.");
        assert_eq!(printer.sd_files().len(), 2);

        let entries = session.delete_selected(true).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(session.selected(), None);
        assert_eq!(printer.sd_files(), vec!["BENCHY.GCO"]);
        channel.close().await;
    }

    #[tokio::test]
    async fn test_disconnected_session_is_soft_error() {
        let session = SdCardSession::new(
            ChannelSlot::new(),
            Arc::new(MarlinDialect),
            SdCardConfig::default(),
            EventDispatcher::default(),
        );
        let err = session.refresh().await.unwrap_err();
        assert_eq!(err.to_string(), "Printer not connected.");
        assert!(matches!(session.select("x.gcode"), Err(SdCardError::UnknownFile { .. })));
    }
}
