//! Parser for the daemon's own configuration file (`aprx.conf`).
//!
//! Extracts the station callsign, the enabled RF interfaces, the node role,
//! and the `myloc` home position. The file is re-parsed fresh on every
//! request so edits to the live config show up without a restart; a missing
//! or unreadable file simply yields an empty [`StationConfig`].

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::coords::{Position, decode_sexagesimal};

/// `myloc lat 4351.23N lon 07932.47W`
static MYLOC_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^myloc\s+lat\s+([0-9]{4,5}\.\d{2}[NS])\s+lon\s+([0-9]{5}\.\d{2}[EW])")
        .expect("valid myloc regex")
});

/// `myloc 4351.23N 07932.47W`
static MYLOC_SEXAGESIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^myloc\s+([0-9]{4,5}\.\d{2}[NS])\s+([0-9]{5}\.\d{2}[EW])")
        .expect("valid myloc regex")
});

/// `myloc 43.85383 -79.54117`
static MYLOC_DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^myloc\s+(-?\d+(?:\.\d+)?)\s+(-?\d+(?:\.\d+)?)").expect("valid myloc regex")
});

static MYCALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^mycall\s+(\S+)").expect("valid mycall regex"));

static TOP_LEVEL_INTERFACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^interface\s+(\S+)").expect("valid interface regex"));

static BLOCK_CALLSIGN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^callsign\s+(\S+)").expect("valid callsign regex"));

/// Station role derived from the daemon configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Digipeater,
    IGate,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Digipeater => write!(f, "Digipeater"),
            Role::IGate => write!(f, "iGate"),
        }
    }
}

/// Daemon-derived station metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StationConfig {
    /// Operator callsign from `mycall`, uppercased.
    pub callsign: Option<String>,

    /// Enabled RF interface names, in configuration order.
    pub interfaces: Vec<String>,

    /// Whether an enabled `<digipeater>` block exists.
    pub is_digipeater: bool,

    /// Home position from `myloc`, when configured.
    pub home: Option<Position>,
}

impl StationConfig {
    /// Parse daemon configuration content.
    pub fn parse(content: &str) -> Self {
        let lines = clean_lines(content);
        let mut data = StationConfig {
            is_digipeater: has_enabled_block(&lines, "digipeater"),
            ..Default::default()
        };

        let mut in_interface_block = false;

        for line in &lines {
            let lower = line.to_ascii_lowercase();

            if lower == "<interface>" {
                in_interface_block = true;
                continue;
            }
            if lower == "</interface>" {
                in_interface_block = false;
                continue;
            }

            if in_interface_block {
                if let Some(caps) = BLOCK_CALLSIGN.captures(line) {
                    push_interface(&mut data.interfaces, &caps[1]);
                }
                continue;
            }

            if let Some(caps) = MYCALL.captures(line) {
                data.callsign = Some(caps[1].to_ascii_uppercase());
            } else if let Some(caps) = TOP_LEVEL_INTERFACE.captures(line) {
                push_interface(&mut data.interfaces, &caps[1]);
            } else if let Some(caps) = MYLOC_KEYWORDS.captures(line) {
                data.home = decode_myloc_pair(&caps[1], &caps[2]).or(data.home);
            } else if let Some(caps) = MYLOC_SEXAGESIMAL.captures(line) {
                data.home = decode_myloc_pair(&caps[1], &caps[2]).or(data.home);
            } else if let Some(caps) = MYLOC_DECIMAL.captures(line) {
                if let (Ok(lat), Ok(lon)) = (caps[1].parse(), caps[2].parse()) {
                    data.home = Some(Position::new(lat, lon));
                }
            }
        }

        data
    }

    /// Load and parse the daemon configuration file.
    ///
    /// Missing or unreadable files are treated as empty input, never fatal.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) => {
                debug!("Cannot read daemon config {}: {}", path.display(), e);
                StationConfig::default()
            }
        }
    }

    /// Node role: digipeater only with an enabled `<digipeater>` block,
    /// iGate otherwise.
    pub fn role(&self) -> Role {
        if self.is_digipeater {
            Role::Digipeater
        } else {
            Role::IGate
        }
    }
}

/// Fully resolved station metadata: daemon config merged with the static
/// fallback configuration. Daemon `myloc` coordinates are authoritative.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedStation {
    pub callsign: String,
    pub role: Role,
    pub interfaces: Vec<String>,
    pub home: Option<Position>,
}

/// Merge daemon-derived metadata with the fallback configuration.
pub fn resolve_station(station: &StationConfig, config: &Config) -> ResolvedStation {
    ResolvedStation {
        callsign: station
            .callsign
            .clone()
            .or_else(|| config.callsign.clone())
            .unwrap_or_else(|| "STATION".to_string()),
        role: station.role(),
        interfaces: station.interfaces.clone(),
        home: station.home.or_else(|| config.fallback_position()),
    }
}

/// Trimmed, non-empty, non-comment lines (comments start with `#`).
fn clean_lines(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

/// True when a complete, uncommented `<tag>…</tag>` block exists.
fn has_enabled_block(lines: &[&str], tag: &str) -> bool {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let mut in_block = false;
    for line in lines {
        let lower = line.to_ascii_lowercase();
        if lower == open {
            in_block = true;
        } else if in_block && lower == close {
            return true;
        }
    }
    false
}

fn push_interface(interfaces: &mut Vec<String>, name: &str) {
    let name = name.to_ascii_uppercase();
    if !interfaces.contains(&name) {
        interfaces.push(name);
    }
}

fn decode_myloc_pair(lat_token: &str, lon_token: &str) -> Option<Position> {
    let lat = decode_sexagesimal(&lat_token.to_ascii_uppercase(), true)?;
    let lon = decode_sexagesimal(&lon_token.to_ascii_uppercase(), false)?;
    Some(Position::new(lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONF: &str = "\
# aprx sample configuration
mycall va3kwj-10
myloc lat 4351.23N lon 07932.47W

<interface>
   callsign VA3KWJ-10
   tx-ok true
</interface>

<aprsis>
   server rotate.aprs2.net
</aprsis>

<digipeater>
   transmitter $mycall
</digipeater>
";

    #[test]
    fn test_parse_sample_conf() {
        let station = StationConfig::parse(SAMPLE_CONF);

        assert_eq!(station.callsign.as_deref(), Some("VA3KWJ-10"));
        assert_eq!(station.interfaces, vec!["VA3KWJ-10"]);
        assert!(station.is_digipeater);
        assert_eq!(station.role(), Role::Digipeater);

        let home = station.home.expect("should have myloc");
        assert!((home.latitude - (43.0 + 51.23 / 60.0)).abs() < 1e-5);
        assert!((home.longitude + (79.0 + 32.47 / 60.0)).abs() < 1e-5);
    }

    #[test]
    fn test_role_defaults_to_igate() {
        let station = StationConfig::parse("mycall N0CALL\ninterface N0CALL-1\n");
        assert!(!station.is_digipeater);
        assert_eq!(station.role(), Role::IGate);
    }

    #[test]
    fn test_commented_digipeater_block_ignored() {
        let conf = "mycall N0CALL\n#<digipeater>\n#   transmitter $mycall\n#</digipeater>\n";
        let station = StationConfig::parse(conf);
        assert_eq!(station.role(), Role::IGate);
    }

    #[test]
    fn test_unclosed_digipeater_block_ignored() {
        let conf = "mycall N0CALL\n<digipeater>\n";
        let station = StationConfig::parse(conf);
        assert_eq!(station.role(), Role::IGate);
    }

    #[test]
    fn test_myloc_bare_sexagesimal() {
        let station = StationConfig::parse("myloc 4351.23N 07932.47W\n");
        let home = station.home.expect("should have myloc");
        assert!((home.latitude - 43.85383).abs() < 1e-3);
        assert!((home.longitude + 79.54117).abs() < 1e-3);
    }

    #[test]
    fn test_myloc_decimal() {
        let station = StationConfig::parse("myloc 43.85383 -79.54117\n");
        let home = station.home.expect("should have myloc");
        assert!((home.latitude - 43.85383).abs() < 1e-9);
        assert!((home.longitude + 79.54117).abs() < 1e-9);
    }

    #[test]
    fn test_top_level_interface_directive() {
        let station = StationConfig::parse("interface VA3KWJ-1\ninterface va3kwj-2\n");
        assert_eq!(station.interfaces, vec!["VA3KWJ-1", "VA3KWJ-2"]);
    }

    #[test]
    fn test_interfaces_deduplicated() {
        let conf = "interface VA3KWJ-1\n<interface>\ncallsign VA3KWJ-1\n</interface>\n";
        let station = StationConfig::parse(conf);
        assert_eq!(station.interfaces, vec!["VA3KWJ-1"]);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let station = StationConfig::load(Path::new("/nonexistent/aprx.conf"));
        assert_eq!(station, StationConfig::default());
        assert_eq!(station.role(), Role::IGate);
    }

    #[test]
    fn test_resolve_prefers_daemon_myloc() {
        let station = StationConfig::parse("mycall VA3KWJ\nmyloc 43.85383 -79.54117\n");
        let config = Config {
            latitude: Some(1.0),
            longitude: Some(2.0),
            ..Default::default()
        };

        let resolved = resolve_station(&station, &config);
        let home = resolved.home.expect("should have home");
        assert!((home.latitude - 43.85383).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_falls_back_to_static_config() {
        let station = StationConfig::parse("mycall VA3KWJ\n");
        let config = Config {
            callsign: Some("FALLBACK".to_string()),
            latitude: Some(43.70011),
            longitude: Some(-79.4163),
            ..Default::default()
        };

        let resolved = resolve_station(&station, &config);
        assert_eq!(resolved.callsign, "VA3KWJ");
        let home = resolved.home.expect("should have fallback home");
        assert!((home.latitude - 43.70011).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_callsign_fallback_chain() {
        let station = StationConfig::default();
        let config = Config {
            callsign: Some("VA3KWJ".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_station(&station, &config).callsign, "VA3KWJ");

        let empty = Config::default();
        assert_eq!(resolve_station(&station, &empty).callsign, "STATION");
    }
}
