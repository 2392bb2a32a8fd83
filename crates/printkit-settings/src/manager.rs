//! Settings manager
//!
//! Owns the in-memory configuration and is its only writer. Readers take
//! copies; writers go through `update`, which validates before committing.

use crate::config::Config;
use crate::error::{SettingsError, SettingsResult};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

/// Application folder under the platform config directory
pub const APP_DIR: &str = "printkit";

/// Default configuration file name
pub const CONFIG_FILE: &str = "config.json";

/// Single writer for the application configuration
#[derive(Debug)]
pub struct SettingsManager {
    path: PathBuf,
    config: RwLock<Config>,
}

impl SettingsManager {
    /// Platform config directory for PrintKit
    pub fn config_dir() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no config directory on this platform".to_string())
            })
    }

    /// Create the config directory if it is missing
    pub fn ensure_config_dir() -> SettingsResult<PathBuf> {
        let dir = Self::config_dir()?;
        std::fs::create_dir_all(&dir)
            .map_err(|e| SettingsError::ConfigDirectory(format!("{}: {}", dir.display(), e)))?;
        Ok(dir)
    }

    /// Default config file path
    pub fn default_path() -> SettingsResult<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Manager for the default config file
    pub fn load_default() -> SettingsResult<Self> {
        Self::load(Self::default_path()?)
    }

    /// Load from `path`, falling back to defaults if the file is missing
    ///
    /// A file that exists but does not parse or validate is an error.
    pub fn load(path: impl Into<PathBuf>) -> SettingsResult<Self> {
        let path = path.into();
        let config = if path.exists() {
            tracing::info!("Loading settings from {}", path.display());
            Config::load_from_file(&path)
                .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?
        } else {
            tracing::info!("No settings at {}; using defaults", path.display());
            Config::default()
        };

        Ok(Self {
            path,
            config: RwLock::new(config),
        })
    }

    /// Manager over an in-memory config
    pub fn with_config(path: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            path: path.into(),
            config: RwLock::new(config),
        }
    }

    /// File this manager saves to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current configuration
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Modify the configuration
    ///
    /// The change is applied to a copy and committed only if it validates.
    pub fn update<F>(&self, change: F) -> SettingsResult<Config>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.config.write();
        let mut candidate = config.clone();
        change(&mut candidate);
        candidate.validate()?;
        *config = candidate.clone();
        Ok(candidate)
    }

    /// Write the configuration to disk
    pub fn save(&self) -> SettingsResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SettingsError::SaveError(format!("{}: {}", parent.display(), e))
                })?;
            }
        }
        let config = self.config();
        config.save_to_file(&self.path)?;
        tracing::debug!("Saved settings to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SettingsManager::load(dir.path().join("config.json")).unwrap();
        assert_eq!(manager.config(), Config::default());
    }

    #[test]
    fn test_invalid_update_is_not_committed() {
        let manager = SettingsManager::with_config("unused.json", Config::default());
        let result = manager.update(|cfg| cfg.connection.baud_rate = 0);
        assert!(result.is_err());
        assert_eq!(manager.config().connection.baud_rate, 115200);
    }
}
