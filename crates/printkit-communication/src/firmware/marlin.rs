//! Marlin dialect

use super::{Capability, FirmwareDialect};
use printkit_core::FirmwareKind;

/// Marlin firmware
#[derive(Debug, Clone, Copy, Default)]
pub struct MarlinDialect;

impl FirmwareDialect for MarlinDialect {
    fn kind(&self) -> FirmwareKind {
        FirmwareKind::Marlin
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[
            Capability::SdCard,
            Capability::SdMountRequired,
            Capability::PositionReport,
            Capability::EmergencyStop,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marlin_vocabulary() {
        let dialect = MarlinDialect;
        assert_eq!(dialect.sd_select("cube.gcode"), "M23 cube.gcode");
        assert_eq!(dialect.sd_delete("cube.gcode"), "M30 cube.gcode");
        assert_eq!(dialect.emergency_stop(), "M112");
        assert!(dialect.supports(Capability::SdMountRequired));
    }
}
