//! aprx Dashboard - Backend for a web dashboard over the aprx packet-radio daemon.
//!
//! This crate provides:
//! - A robust nom-based parser for aprx RF-log lines
//! - APRS position decoding (sexagesimal and base-91 compressed)
//! - Aggregated views: recent calls, station map, per-interface stats
//! - An axum HTTP API plus incremental log tailing
//!
//! # Example
//!
//! ```rust
//! use aprx_dashboard::parser::parse_log_line;
//!
//! let line = "2024-01-01 12:00:00.000 VA3KWJ-10 R TESTCALL>APRS,WIDE1-1:!4903.50N/07201.75W-hello";
//! let event = parse_log_line(line).expect("Failed to parse line");
//!
//! assert_eq!(event.callsign, "TESTCALL");
//! assert!(event.position.is_some());
//! ```

pub mod aggregate;
pub mod aprx;
pub mod config;
pub mod coords;
pub mod event;
pub mod geocode;
pub mod parser;
pub mod server;
pub mod tail;

pub use aggregate::{SourceFilter, TimeRange, build_recent_calls, build_station_snapshots, build_stats};
pub use aprx::{ResolvedStation, Role, StationConfig, resolve_station};
pub use config::Config;
pub use coords::{Position, extract_position, haversine_km};
pub use event::{Direction, HeardEvent, SourceClass};
pub use parser::{ParseError, looks_like_packet, parse_log_line, scan_lines, scan_log};
