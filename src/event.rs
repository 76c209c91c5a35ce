//! Data structures representing heard packets.
//!
//! One `HeardEvent` is derived per matching log line. Events are immutable
//! and recomputed from the log file on every request; nothing is persisted.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::coords::Position;

/// Literal source token the daemon writes for internet-gated traffic.
pub const APRSIS_TOKEN: &str = "APRSIS";

/// Whether the packet was received or transmitted (digipeated) by us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// `R` lines: a packet heard on the interface.
    Received,
    /// `T` lines: a retransmitted copy, never counted as "heard".
    Transmitted,
}

impl Direction {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'R' => Some(Direction::Received),
            'T' => Some(Direction::Transmitted),
            _ => None,
        }
    }
}

/// Where the packet came from: directly over radio, or via the internet
/// backbone network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceClass {
    #[serde(rename = "RF")]
    Rf,
    #[serde(rename = "APRS-IS")]
    AprsIs,
}

impl fmt::Display for SourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceClass::Rf => write!(f, "RF"),
            SourceClass::AprsIs => write!(f, "APRS-IS"),
        }
    }
}

/// One observed packet extracted from a daemon log line.
///
/// # Example
///
/// A raw line like:
/// ```text
/// 2024-01-01 12:00:00.123 VA3KWJ-10 R TESTCALL>APRS,WIDE1-1:!4903.50N/07201.75W-hello
/// ```
///
/// becomes a `HeardEvent` with:
/// - `callsign`: "TESTCALL"
/// - `source`: "VA3KWJ-10"
/// - `direction`: Received
/// - a decoded position and the trailing comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeardEvent {
    /// Sending station, uppercased, possibly with an SSID suffix (`-10`).
    pub callsign: String,

    /// Raw source token from the log: an RF interface callsign or `APRSIS`.
    pub source: String,

    /// Received or transmitted.
    pub direction: Direction,

    /// Log timestamp in local time, fractional seconds discarded.
    pub timestamp: DateTime<Local>,

    /// Decoded position, when the payload carried one in either encoding.
    pub position: Option<Position>,

    /// Free-text comment extracted from the payload, when present.
    pub comment: Option<String>,
}

impl HeardEvent {
    /// RF vs APRS-IS, derived from the source token.
    pub fn source_class(&self) -> SourceClass {
        if self.source.eq_ignore_ascii_case(APRSIS_TOKEN) {
            SourceClass::AprsIs
        } else {
            SourceClass::Rf
        }
    }

    /// Unix timestamp of the event.
    pub fn unix_time(&self) -> i64 {
        self.timestamp.timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_event(source: &str) -> HeardEvent {
        HeardEvent {
            callsign: "TESTCALL".to_string(),
            source: source.to_string(),
            direction: Direction::Received,
            timestamp: Local.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            position: None,
            comment: None,
        }
    }

    #[test]
    fn test_source_class_rf() {
        assert_eq!(make_event("VA3KWJ-10").source_class(), SourceClass::Rf);
    }

    #[test]
    fn test_source_class_aprsis_case_insensitive() {
        assert_eq!(make_event("APRSIS").source_class(), SourceClass::AprsIs);
        assert_eq!(make_event("aprsis").source_class(), SourceClass::AprsIs);
    }

    #[test]
    fn test_direction_from_char() {
        assert_eq!(Direction::from_char('R'), Some(Direction::Received));
        assert_eq!(Direction::from_char('T'), Some(Direction::Transmitted));
        assert_eq!(Direction::from_char('X'), None);
    }
}
