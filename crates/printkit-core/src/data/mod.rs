//! Data models for printer status, SD card listings, and print profiles
//!
//! This module provides:
//! - Temperature and position readings with an "unknown" state
//! - The status snapshot published by the status poller
//! - SD card file entries
//! - Connection and polling modes
//! - Printer/material profiles used by the slicer

pub mod profile;

pub use profile::{FirmwareKind, Material, MaterialPreset, PrinterProfile, SeamPosition, SupportStyle};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder shown for values that have not been reported yet
pub const UNKNOWN: &str = "--";

fn fmt_reading(f: &mut fmt::Formatter<'_>, value: Option<f64>) -> fmt::Result {
    match value {
        Some(v) => write!(f, "{:.1}", v),
        None => f.write_str(UNKNOWN),
    }
}

/// A heater reading: current and target temperature in °C
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Temperature {
    /// Measured temperature
    pub current: Option<f64>,
    /// Target temperature
    pub target: Option<f64>,
}

impl Temperature {
    /// Create a fully known reading
    pub fn new(current: f64, target: f64) -> Self {
        Self {
            current: Some(current),
            target: Some(target),
        }
    }

    /// Check whether both values are known
    pub fn is_known(&self) -> bool {
        self.current.is_some() && self.target.is_some()
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_reading(f, self.current)?;
        f.write_str(" / ")?;
        fmt_reading(f, self.target)
    }
}

/// Toolhead position in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X axis
    pub x: f64,
    /// Y axis
    pub y: f64,
    /// Z axis
    pub z: f64,
}

impl Position {
    /// Create a new position
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X{:.2} Y{:.2} Z{:.2}", self.x, self.y, self.z)
    }
}

/// Temperature report as parsed from a firmware reply
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReport {
    /// Hotend reading
    pub nozzle: Temperature,
    /// Heated bed reading
    pub bed: Temperature,
}

/// Latest known printer telemetry
///
/// A value type: readers always receive a copy, only the status poller
/// writes it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Hotend temperature
    pub nozzle: Temperature,
    /// Bed temperature
    pub bed: Temperature,
    /// Last reported position
    pub position: Option<Position>,
}

impl StatusSnapshot {
    /// Snapshot with every field unknown
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Check whether nothing has been reported yet
    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }

    /// Apply a parsed temperature report
    pub fn apply_temperatures(&mut self, report: TemperatureReport) {
        self.nozzle = report.nozzle;
        self.bed = report.bed;
    }

    /// Apply a parsed position report
    pub fn apply_position(&mut self, position: Position) {
        self.position = Some(position);
    }

    /// Position formatted for display, or the unknown placeholder
    pub fn position_label(&self) -> String {
        match self.position {
            Some(p) => p.to_string(),
            None => format!("X{u} Y{u} Z{u}", u = UNKNOWN),
        }
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Nozzle: {} | Bed: {} | {}",
            self.nozzle,
            self.bed,
            self.position_label()
        )
    }
}

/// Status polling cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollMode {
    /// Nothing printing: poll at the idle interval
    #[default]
    Idle,
    /// A print is running: poll at the (slower) print interval
    Printing,
}

impl fmt::Display for PollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Printing => write!(f, "printing"),
        }
    }
}

/// Connection lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No open connection
    #[default]
    Disconnected,
    /// Port opened, waiting for the firmware to settle
    Connecting,
    /// Ready to accept commands
    Connected {
        /// Port name
        port: String,
        /// Baud rate
        baud_rate: u32,
    },
}

impl ConnectionState {
    /// Check whether commands can be sent
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { port, baud_rate } => {
                write!(f, "Connected to {} @ {}", port, baud_rate)
            }
        }
    }
}

/// A file found in an SD card listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdFileEntry {
    /// File name as the firmware expects it in select/delete commands
    pub filename: String,
    /// The listing line the name was taken from
    pub raw_line: String,
}

impl SdFileEntry {
    /// Create a new entry
    pub fn new(filename: impl Into<String>, raw_line: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            raw_line: raw_line.into(),
        }
    }
}
