//! Persistent user settings for mfwrite
//!
//! Settings are stored in a TOML configuration file at:
//! - Linux/macOS: `~/.config/mfwrite/mfwrite_config.toml`
//! - Windows: `%APPDATA%\mfwrite\mfwrite_config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! [write]
//! allow_manufacturer_block = false
//! static_access_conditions = "FF0780"
//!
//! [behavior]
//! skip_confirmation = false
//! quiet = false
//! ```

use crate::error::Result as CoreResult;
use crate::hexfmt::{parse_access_conditions, ACCESS_CONDITIONS_SIZE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration file name
const CONFIG_FILE_NAME: &str = "mfwrite_config.toml";

/// Application name for config directory
const APP_NAME: &str = "mfwrite";

/// User settings loaded from configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Write operation settings
    pub write: WriteSettings,

    /// Behavior settings
    pub behavior: BehaviorSettings,
}

/// Settings for write operations
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WriteSettings {
    /// Whether dump writes may include the manufacturer block
    pub allow_manufacturer_block: bool,

    /// Access conditions (3 bytes hex, e.g. "FF0780") applied to every
    /// trailer of a dump before planning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_access_conditions: Option<String>,
}

impl WriteSettings {
    /// Parsed static access conditions, if configured
    pub fn static_access_conditions(&self) -> CoreResult<Option<[u8; ACCESS_CONDITIONS_SIZE]>> {
        self.static_access_conditions
            .as_deref()
            .map(parse_access_conditions)
            .transpose()
    }
}

/// General behavior settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BehaviorSettings {
    /// Whether to skip confirmation prompts by default
    pub skip_confirmation: bool,

    /// Whether to suppress non-error output
    pub quiet: bool,
}

impl Settings {
    /// Load settings from the configuration file
    ///
    /// Returns default settings if the file doesn't exist or can't be parsed
    pub fn load() -> Self {
        Self::load_from_path(Self::config_path())
    }

    /// Load settings from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            tracing::debug!("No config path available, using defaults");
            return Self::default();
        };

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(settings) => {
                    tracing::debug!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save settings to the configuration file
    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        self.save_to_path(Self::config_path())
    }

    /// Save settings to a specific path
    pub fn save_to_path(&self, path: Option<PathBuf>) -> Result<PathBuf, SettingsError> {
        let path = path.ok_or(SettingsError::NoConfigDir)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let contents = toml::to_string_pretty(self).map_err(SettingsError::Serialize)?;

        std::fs::write(&path, contents).map_err(|e| SettingsError::Io {
            path: path.clone(),
            source: e,
        })?;

        tracing::info!("Saved settings to {:?}", path);
        Ok(path)
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join(CONFIG_FILE_NAME))
    }

    /// Get the path to the configuration directory
    pub fn config_dir() -> Option<PathBuf> {
        dirs_next::config_dir().map(|p| p.join(APP_NAME))
    }

    /// Check if a configuration file exists
    pub fn config_exists() -> bool {
        Self::config_path().is_some_and(|p| p.exists())
    }

    /// Generate a default configuration file content as a string
    pub fn default_config_string() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate default config"))
    }
}

/// Errors that can occur when working with settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// No configuration directory available
    #[error("Could not determine configuration directory")]
    NoConfigDir,

    /// Failed to read or write config file
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path that caused the error
        path: PathBuf,
        /// The underlying error
        source: std::io::Error,
    },

    /// Failed to serialize settings
    #[error("Failed to serialize settings: {0}")]
    Serialize(toml::ser::Error),
}
