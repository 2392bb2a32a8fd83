//! Printer and material profiles
//!
//! The profile holds the machine geometry and print parameters handed to
//! the external slicer. Material presets provide known-good temperatures
//! and fan speeds for common filaments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Firmware family running on the printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirmwareKind {
    /// Marlin (default, most common)
    #[default]
    Marlin,
    /// Klipper
    Klipper,
    /// RepRapFirmware
    RepRap,
}

impl FirmwareKind {
    /// Flavor name understood by the slicer's `gcode_flavor` option
    pub fn gcode_flavor(&self) -> &'static str {
        match self {
            Self::Marlin => "marlin",
            Self::Klipper => "klipper",
            Self::RepRap => "reprap",
        }
    }
}

impl fmt::Display for FirmwareKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Marlin => write!(f, "Marlin"),
            Self::Klipper => write!(f, "Klipper"),
            Self::RepRap => write!(f, "RepRap"),
        }
    }
}

impl FromStr for FirmwareKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "marlin" => Ok(Self::Marlin),
            "klipper" => Ok(Self::Klipper),
            "reprap" | "rrf" | "reprapfirmware" => Ok(Self::RepRap),
            other => Err(format!("Unknown firmware type: {}", other)),
        }
    }
}

/// Filament material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Material {
    /// Polylactic acid
    #[default]
    PLA,
    /// PET-G
    PETG,
    /// ABS
    ABS,
    /// ASA
    ASA,
    /// Flexible TPU
    TPU,
    /// Nylon
    Nylon,
    /// Polycarbonate
    PC,
}

impl Material {
    /// All known materials
    pub const ALL: [Material; 7] = [
        Material::PLA,
        Material::PETG,
        Material::ABS,
        Material::ASA,
        Material::TPU,
        Material::Nylon,
        Material::PC,
    ];

    /// Recommended settings for this material
    pub fn preset(&self) -> MaterialPreset {
        let (nozzle, bed, fan) = match self {
            Material::PLA => (205, 60, 100),
            Material::PETG => (240, 80, 50),
            Material::ABS => (250, 100, 0),
            Material::ASA => (260, 110, 0),
            Material::TPU => (230, 0, 100),
            Material::Nylon => (250, 70, 0),
            Material::PC => (270, 110, 0),
        };
        MaterialPreset {
            nozzle_temp: nozzle,
            bed_temp: bed,
            fan_speed: fan,
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Material::PLA => "PLA",
            Material::PETG => "PETG",
            Material::ABS => "ABS",
            Material::ASA => "ASA",
            Material::TPU => "TPU",
            Material::Nylon => "Nylon",
            Material::PC => "PC",
        };
        f.write_str(name)
    }
}

impl FromStr for Material {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Material::ALL
            .iter()
            .copied()
            .find(|m| m.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown material: {}", s))
    }
}

/// Temperatures and fan speed recommended for a material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialPreset {
    /// Hotend temperature (°C)
    pub nozzle_temp: u16,
    /// Bed temperature (°C)
    pub bed_temp: u16,
    /// Part cooling fan (%)
    pub fan_speed: u8,
}

/// Support structure style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportStyle {
    /// Tree-like organic supports
    #[default]
    Organic,
    /// Rectilinear grid supports
    Grid,
}

impl fmt::Display for SupportStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Organic => write!(f, "organic"),
            Self::Grid => write!(f, "grid"),
        }
    }
}

/// Seam placement strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeamPosition {
    /// Align seams on one edge
    #[default]
    Aligned,
    /// Nearest to the previous layer's end
    Nearest,
    /// Random placement
    Random,
    /// Rear of the part
    Rear,
}

impl fmt::Display for SeamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aligned => write!(f, "aligned"),
            Self::Nearest => write!(f, "nearest"),
            Self::Random => write!(f, "random"),
            Self::Rear => write!(f, "rear"),
        }
    }
}

/// Machine geometry and print parameters handed to the slicer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterProfile {
    /// Firmware family (selects the slicer's G-code flavor)
    pub firmware: FirmwareKind,
    /// Bed width (mm)
    pub bed_x: f64,
    /// Bed depth (mm)
    pub bed_y: f64,
    /// Maximum print height (mm)
    pub bed_z: f64,
    /// Nozzle diameter (mm)
    pub nozzle_size: f64,
    /// Filament diameter (mm)
    pub filament_diameter: f64,
    /// Emit relative extrusion distances
    pub use_relative_e: bool,
    /// Retraction length (mm)
    pub retract_length: f64,
    /// Minimum travel before retracting (mm)
    pub retract_min_travel: f64,
    /// Travel speed (mm/s)
    pub travel_speed: f64,
    /// Perimeter speed (mm/s)
    pub perimeter_speed: f64,
    /// First layer speed (mm/s)
    pub first_layer_speed: f64,
    /// Filament material
    pub material: Material,
    /// Infill density (%)
    pub infill_density: u8,
    /// Layer height (mm)
    pub layer_height: f64,
    /// Hotend temperature (°C)
    pub nozzle_temp: u16,
    /// Bed temperature (°C)
    pub bed_temp: u16,
    /// Part cooling fan (%)
    pub fan_speed: u8,
    /// Brim width when a brim is requested (mm)
    pub brim_width: f64,
    /// Support contact gap (mm)
    pub support_gap: f64,
    /// Organic support spacing (mm)
    pub support_spacing_organic: f64,
    /// Grid support spacing (mm)
    pub support_spacing_grid: f64,
    /// Model scale (%)
    pub scale_percent: f64,
    /// Elephant foot compensation (mm)
    pub elephant_foot_compensation: f64,
    /// Seam placement
    pub seam_position: SeamPosition,
    /// Wipe nozzle while retracting
    pub wipe_on_retract: bool,
}

impl Default for PrinterProfile {
    fn default() -> Self {
        let preset = Material::PLA.preset();
        Self {
            firmware: FirmwareKind::Marlin,
            bed_x: 220.0,
            bed_y: 220.0,
            bed_z: 250.0,
            nozzle_size: 0.4,
            filament_diameter: 1.75,
            use_relative_e: false,
            retract_length: 5.0,
            retract_min_travel: 2.0,
            travel_speed: 150.0,
            perimeter_speed: 40.0,
            first_layer_speed: 20.0,
            material: Material::PLA,
            infill_density: 20,
            layer_height: 0.20,
            nozzle_temp: preset.nozzle_temp,
            bed_temp: preset.bed_temp,
            fan_speed: preset.fan_speed,
            brim_width: 5.0,
            support_gap: 0.25,
            support_spacing_organic: 3.0,
            support_spacing_grid: 2.5,
            scale_percent: 100.0,
            elephant_foot_compensation: 0.0,
            seam_position: SeamPosition::Aligned,
            wipe_on_retract: false,
        }
    }
}

impl PrinterProfile {
    /// Switch material and adopt its preset temperatures and fan speed
    pub fn apply_material(&mut self, material: Material) {
        let preset = material.preset();
        self.material = material;
        self.nozzle_temp = preset.nozzle_temp;
        self.bed_temp = preset.bed_temp;
        self.fan_speed = preset.fan_speed;
    }

    /// Scale factor (1.0 = 100%)
    pub fn scale_factor(&self) -> f64 {
        self.scale_percent / 100.0
    }

    /// Validate the profile
    pub fn validate(&self) -> Result<(), String> {
        if self.bed_x <= 0.0 || self.bed_y <= 0.0 || self.bed_z <= 0.0 {
            return Err("Bed dimensions must be > 0".to_string());
        }
        if self.nozzle_size <= 0.0 || self.filament_diameter <= 0.0 {
            return Err("Nozzle and filament diameters must be > 0".to_string());
        }
        if self.layer_height <= 0.0 || self.layer_height > self.nozzle_size {
            return Err(format!(
                "Layer height must be in (0, {}]",
                self.nozzle_size
            ));
        }
        if self.infill_density > 100 || self.fan_speed > 100 {
            return Err("Percentages must be within 0-100".to_string());
        }
        if self.scale_percent <= 0.0 {
            return Err("Scale must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_valid() {
        assert!(PrinterProfile::default().validate().is_ok());
    }

    #[test]
    fn test_apply_material_overwrites_temperatures() {
        let mut profile = PrinterProfile::default();
        profile.apply_material(Material::PETG);
        assert_eq!(profile.nozzle_temp, 240);
        assert_eq!(profile.bed_temp, 80);
        assert_eq!(profile.fan_speed, 50);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("klipper".parse::<FirmwareKind>(), Ok(FirmwareKind::Klipper));
        assert_eq!("RRF".parse::<FirmwareKind>(), Ok(FirmwareKind::RepRap));
        assert_eq!("nylon".parse::<Material>(), Ok(Material::Nylon));
        assert!("wood".parse::<Material>().is_err());
    }

    #[test]
    fn test_layer_height_limited_by_nozzle() {
        let profile = PrinterProfile {
            layer_height: 0.6,
            ..PrinterProfile::default()
        };
        assert!(profile.validate().is_err());
    }
}
