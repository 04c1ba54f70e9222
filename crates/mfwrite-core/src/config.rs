//! Configuration for mfwrite operations

use crate::hexfmt::ACCESS_CONDITIONS_SIZE;
use crate::settings::Settings;

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Whether sector 0, block 0 may be part of a dump write
    pub allow_manufacturer_write: bool,

    /// Access conditions to stamp into every trailer before planning
    pub static_access_conditions: Option<[u8; ACCESS_CONDITIONS_SIZE]>,
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set allow_manufacturer_write
    pub fn allow_manufacturer_write(mut self, allow: bool) -> Self {
        self.allow_manufacturer_write = allow;
        self
    }

    /// Set static access conditions
    pub fn static_access_conditions(mut self, ac: Option<[u8; ACCESS_CONDITIONS_SIZE]>) -> Self {
        self.static_access_conditions = ac;
        self
    }

    /// Config carrying the defaults from persistent settings
    ///
    /// An unparsable access-condition string is ignored with a warning.
    pub fn from_settings(settings: &Settings) -> Self {
        let static_access_conditions = match settings.write.static_access_conditions() {
            Ok(ac) => ac,
            Err(e) => {
                tracing::warn!("Ignoring static_access_conditions from settings: {}", e);
                None
            }
        };
        Self {
            allow_manufacturer_write: settings.write.allow_manufacturer_block,
            static_access_conditions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::WriteSettings;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(!config.allow_manufacturer_write);
        assert_eq!(config.static_access_conditions, None);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new()
            .allow_manufacturer_write(true)
            .static_access_conditions(Some([0xFF, 0x07, 0x80]));

        assert!(config.allow_manufacturer_write);
        assert_eq!(config.static_access_conditions, Some([0xFF, 0x07, 0x80]));
    }

    #[test]
    fn test_config_from_settings() {
        let mut settings = Settings::default();
        settings.write = WriteSettings {
            allow_manufacturer_block: true,
            static_access_conditions: Some("7F0788".to_string()),
        };
        let config = Config::from_settings(&settings);
        assert!(config.allow_manufacturer_write);
        assert_eq!(config.static_access_conditions, Some([0x7F, 0x07, 0x88]));
    }

    #[test]
    fn test_config_from_settings_bad_ac() {
        let mut settings = Settings::default();
        settings.write.static_access_conditions = Some("nothex".to_string());
        let config = Config::from_settings(&settings);
        assert_eq!(config.static_access_conditions, None);
    }
}
