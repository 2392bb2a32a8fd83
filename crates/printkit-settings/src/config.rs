//! Configuration structures
//!
//! One explicit `Config` replaces scattered global settings. Each
//! component receives its own section by value when it is built.

use crate::error::{ConfigError, ConfigResult, SettingsResult};
use printkit_core::{FirmwareKind, PrinterProfile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Last used port (empty if none)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Firmware settle delay after opening the port (ms)
    pub open_settle_ms: u64,
    /// Pause between a command and its reply (ms)
    pub response_settle_ms: u64,
    /// Upper bound on collecting a reply (ms)
    pub response_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115200,
            open_settle_ms: 2000,
            response_settle_ms: 100,
            response_timeout_ms: 1000,
        }
    }
}

impl ConnectionSettings {
    /// Firmware settle delay
    pub fn open_settle(&self) -> Duration {
        Duration::from_millis(self.open_settle_ms)
    }

    /// Reply settle window
    pub fn response_settle(&self) -> Duration {
        Duration::from_millis(self.response_settle_ms)
    }

    /// Reply timeout
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Status polling cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Interval while idle (s)
    pub idle_interval_secs: u64,
    /// Interval while printing (s)
    pub print_interval_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            idle_interval_secs: 2,
            print_interval_secs: 10,
        }
    }
}

/// SD card behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdCardSettings {
    /// Wait for the listing to arrive (ms)
    pub listing_settle_ms: u64,
    /// Disconnect after an SD print starts
    pub disconnect_on_sd_print: bool,
}

impl Default for SdCardSettings {
    fn default() -> Self {
        Self {
            listing_settle_ms: 5000,
            disconnect_on_sd_print: false,
        }
    }
}

/// G-code streaming
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    /// Pause after each streamed line (ms)
    pub line_delay_ms: u64,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self { line_delay_ms: 5 }
    }
}

/// Firmware selection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareSettings {
    /// Firmware family of the printer
    pub kind: FirmwareKind,
}

/// Slicer integration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicerSettings {
    /// Explicit slicer executable; searched for when unset
    pub executable: Option<PathBuf>,
    /// Printer and print parameters
    pub profile: PrinterProfile,
}

/// Complete application configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Status polling
    pub polling: PollingSettings,
    /// SD card
    pub sd_card: SdCardSettings,
    /// Streaming
    pub streaming: StreamingSettings,
    /// Firmware
    pub firmware: FirmwareSettings,
    /// Slicer
    pub slicer: SlicerSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

fn format_for(path: &Path) -> ConfigResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_for(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_for(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        fn out_of_range(key: &str, value: impl ToString) -> ConfigError {
            ConfigError::ValueOutOfRange {
                key: key.to_string(),
                value: value.to_string(),
            }
        }

        if self.connection.baud_rate == 0 {
            return Err(out_of_range("connection.baud_rate", self.connection.baud_rate));
        }
        if self.connection.response_timeout_ms == 0 {
            return Err(out_of_range(
                "connection.response_timeout_ms",
                self.connection.response_timeout_ms,
            ));
        }
        if self.connection.response_settle_ms > self.connection.response_timeout_ms {
            return Err(out_of_range(
                "connection.response_settle_ms",
                self.connection.response_settle_ms,
            ));
        }

        if self.polling.idle_interval_secs == 0 {
            return Err(out_of_range(
                "polling.idle_interval_secs",
                self.polling.idle_interval_secs,
            ));
        }
        if self.polling.print_interval_secs == 0 {
            return Err(out_of_range(
                "polling.print_interval_secs",
                self.polling.print_interval_secs,
            ));
        }

        if let Some(exe) = &self.slicer.executable {
            if exe.as_os_str().is_empty() {
                return Err(out_of_range("slicer.executable", "\"\""));
            }
        }
        self.slicer
            .profile
            .validate()
            .map_err(ConfigError::InvalidProfile)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.connection.open_settle(), Duration::from_secs(2));
        assert_eq!(config.polling.idle_interval_secs, 2);
        assert_eq!(config.polling.print_interval_secs, 10);
        assert_eq!(config.sd_card.listing_settle_ms, 5000);
        assert_eq!(config.streaming.line_delay_ms, 5);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut config = Config::default();
        config.polling.idle_interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        assert_eq!(
            format_for(Path::new("printkit.yaml")),
            Err(ConfigError::UnsupportedFormat("yaml".to_string()))
        );
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[sd_card]\ndisconnect_on_sd_print = true\n").unwrap();
        assert!(config.sd_card.disconnect_on_sd_print);
        assert_eq!(config.sd_card.listing_settle_ms, 5000);
        assert_eq!(config.connection.baud_rate, 115200);
    }
}
