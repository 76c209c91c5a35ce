//! Configuration file support for the dashboard.
//!
//! Loads settings from `~/.config/aprx-dashboard/config.toml` on Linux
//! (or platform-appropriate location on other OSes). This is the static
//! fallback configuration: it points at the daemon's files and supplies
//! default home coordinates and callsign for when `aprx.conf` lacks `myloc`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::coords::Position;

/// Default location of the daemon configuration file.
pub const DEFAULT_APRX_CONF: &str = "/etc/aprx.conf";

/// Default RF packet log written by the daemon.
pub const DEFAULT_RF_LOG: &str = "/var/log/aprx/aprx-rf.log";

/// Default daemon status log.
pub const DEFAULT_DAEMON_LOG: &str = "/var/log/aprx/aprx.log";

/// Default port for the dashboard HTTP API.
pub const DEFAULT_PORT: u16 = 8073;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the daemon configuration file.
    pub aprx_config_path: PathBuf,

    /// Path to the RF packet log.
    pub rf_log_path: PathBuf,

    /// Path to the daemon status log.
    pub daemon_log_path: PathBuf,

    /// Fallback operator callsign when `aprx.conf` has no `mycall`.
    pub callsign: Option<String>,

    /// Fallback home latitude in decimal degrees.
    pub latitude: Option<f64>,

    /// Fallback home longitude in decimal degrees.
    pub longitude: Option<f64>,

    /// Port for the dashboard HTTP API.
    pub bind_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aprx_config_path: PathBuf::from(DEFAULT_APRX_CONF),
            rf_log_path: PathBuf::from(DEFAULT_RF_LOG),
            daemon_log_path: PathBuf::from(DEFAULT_DAEMON_LOG),
            callsign: None,
            latitude: None,
            longitude: None,
            bind_port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Load configuration from the default config file location.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but is malformed.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in config file: {}", path.display()))
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("aprx-dashboard/config.toml"))
    }

    /// Fallback home position, when both coordinates are configured.
    pub fn fallback_position(&self) -> Option<Position> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Position::new(lat, lon)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.aprx_config_path, PathBuf::from(DEFAULT_APRX_CONF));
        assert_eq!(config.rf_log_path, PathBuf::from(DEFAULT_RF_LOG));
        assert_eq!(config.bind_port, DEFAULT_PORT);
        assert!(config.callsign.is_none());
        assert!(config.fallback_position().is_none());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
            callsign = "VA3KWJ"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.callsign.as_deref(), Some("VA3KWJ"));
        // Other fields should use defaults
        assert_eq!(config.rf_log_path, PathBuf::from(DEFAULT_RF_LOG));
        assert_eq!(config.bind_port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            aprx_config_path = "/tmp/aprx.conf"
            rf_log_path = "/tmp/aprx-rf.log"
            daemon_log_path = "/tmp/aprx.log"
            callsign = "VA3KWJ"
            latitude = 43.70011
            longitude = -79.4163
            bind_port = 8080
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.aprx_config_path, PathBuf::from("/tmp/aprx.conf"));
        assert_eq!(config.rf_log_path, PathBuf::from("/tmp/aprx-rf.log"));
        assert_eq!(config.daemon_log_path, PathBuf::from("/tmp/aprx.log"));
        assert_eq!(config.callsign.as_deref(), Some("VA3KWJ"));
        assert_eq!(config.bind_port, 8080);

        let home = config.fallback_position().expect("should have position");
        assert!((home.latitude - 43.70011).abs() < 1e-9);
        assert!((home.longitude + 79.4163).abs() < 1e-9);
    }

    #[test]
    fn test_partial_coordinates_are_no_position() {
        let toml = r#"
            latitude = 43.70011
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.fallback_position().is_none());
    }

    #[test]
    fn test_load_from_missing_file_errors() {
        assert!(Config::load_from(Path::new("/nonexistent/config.toml")).is_err());
    }
}
