//! PrintKit Settings Crate
//!
//! Handles application configuration, validation, and persistence.

pub mod config;
pub mod error;
pub mod manager;

pub use config::{
    Config, ConnectionSettings, FirmwareSettings, PollingSettings, SdCardSettings,
    SlicerSettings, StreamingSettings,
};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
pub use manager::SettingsManager;
