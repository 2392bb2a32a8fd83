//! Klipper dialect
//!
//! Klipper exposes its virtual SD card through the same M20/M23/M24/M30
//! commands but has no card to mount.

use super::{Capability, FirmwareDialect};
use printkit_core::FirmwareKind;

/// Klipper firmware
#[derive(Debug, Clone, Copy, Default)]
pub struct KlipperDialect;

impl FirmwareDialect for KlipperDialect {
    fn kind(&self) -> FirmwareKind {
        FirmwareKind::Klipper
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[
            Capability::SdCard,
            Capability::PositionReport,
            Capability::EmergencyStop,
        ]
    }
}
