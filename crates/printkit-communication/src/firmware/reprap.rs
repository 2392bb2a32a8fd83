//! RepRapFirmware dialect

use super::{reply_parser, Capability, FirmwareDialect};
use printkit_core::{FirmwareKind, TemperatureReport};

/// RepRapFirmware (Duet boards)
#[derive(Debug, Clone, Copy, Default)]
pub struct RepRapDialect;

impl FirmwareDialect for RepRapDialect {
    fn kind(&self) -> FirmwareKind {
        FirmwareKind::RepRap
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[
            Capability::SdCard,
            Capability::SdMountRequired,
            Capability::PositionReport,
            Capability::EmergencyStop,
        ]
    }

    // Multi-tool boards report `T0:` instead of `T:`
    fn parse_temperatures(&self, reply: &str) -> Option<TemperatureReport> {
        reply_parser::parse_indexed_temperatures(reply)
    }
}
