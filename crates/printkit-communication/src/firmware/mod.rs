//! Firmware dialects
//!
//! Supported firmwares:
//! - Marlin: the common default
//! - Klipper: virtual SD card, no mount step
//! - RepRapFirmware: tool-indexed temperature replies
//!
//! Each dialect supplies its command vocabulary, reply grammars, and a
//! capability set. Everything above the dialect is firmware-agnostic.

pub mod klipper;
pub mod marlin;
pub mod reply_parser;
pub mod reprap;

pub use klipper::KlipperDialect;
pub use marlin::MarlinDialect;
pub use reprap::RepRapDialect;

use printkit_core::{FirmwareKind, Position, SdFileEntry, TemperatureReport};
use std::sync::Arc;

/// Capability flags for firmware dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Can list and print files from an SD card
    SdCard,
    /// The card must be mounted (`M21`) before listing
    SdMountRequired,
    /// Answers position queries
    PositionReport,
    /// Honors an immediate emergency stop
    EmergencyStop,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SdCard => write!(f, "SD Card"),
            Self::SdMountRequired => write!(f, "SD Mount Required"),
            Self::PositionReport => write!(f, "Position Report"),
            Self::EmergencyStop => write!(f, "E-Stop"),
        }
    }
}

/// Command vocabulary and reply grammar of a firmware family
pub trait FirmwareDialect: Send + Sync {
    /// Firmware family
    fn kind(&self) -> FirmwareKind;

    /// Supported capabilities
    fn capabilities(&self) -> &'static [Capability];

    /// Check a single capability
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Temperature query
    fn temperature_query(&self) -> &'static str {
        "M105"
    }

    /// Position query
    fn position_query(&self) -> &'static str {
        "M114"
    }

    /// SD mount command, if the firmware needs one
    fn sd_mount(&self) -> Option<&'static str> {
        self.supports(Capability::SdMountRequired).then_some("M21")
    }

    /// SD listing command
    fn sd_list(&self) -> &'static str {
        "M20"
    }

    /// Select a file for printing
    fn sd_select(&self, filename: &str) -> String {
        format!("M23 {}", filename)
    }

    /// Start or resume the selected file
    fn sd_start(&self) -> &'static str {
        "M24"
    }

    /// Delete a file
    fn sd_delete(&self, filename: &str) -> String {
        format!("M30 {}", filename)
    }

    /// Emergency stop
    fn emergency_stop(&self) -> &'static str {
        "M112"
    }

    /// Parse a temperature reply
    fn parse_temperatures(&self, reply: &str) -> Option<TemperatureReport> {
        reply_parser::parse_temperatures(reply)
    }

    /// Parse a position reply
    fn parse_position(&self, reply: &str) -> Option<Position> {
        reply_parser::parse_position(reply)
    }

    /// Parse an SD listing
    fn parse_sd_listing(&self, listing: &str) -> Vec<SdFileEntry> {
        reply_parser::parse_sd_listing(listing)
    }
}

/// Dialect for a firmware family
pub fn dialect_for(kind: FirmwareKind) -> Arc<dyn FirmwareDialect> {
    match kind {
        FirmwareKind::Marlin => Arc::new(MarlinDialect),
        FirmwareKind::Klipper => Arc::new(KlipperDialect),
        FirmwareKind::RepRap => Arc::new(RepRapDialect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_for_kind() {
        for kind in [FirmwareKind::Marlin, FirmwareKind::Klipper, FirmwareKind::RepRap] {
            assert_eq!(dialect_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_mount_follows_capability() {
        assert_eq!(dialect_for(FirmwareKind::Marlin).sd_mount(), Some("M21"));
        assert_eq!(dialect_for(FirmwareKind::Klipper).sd_mount(), None);
    }
}
