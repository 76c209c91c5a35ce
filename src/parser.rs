//! Parser for aprx RF-log lines.
//!
//! This module uses the `nom` parsing library to turn the daemon's
//! loosely-structured log lines into typed [`HeardEvent`] records. The parser
//! is designed with correctness as the primary goal: logs interleave packet
//! records with status noise, so anything that does not match the grammar is
//! skipped rather than treated as an error.
//!
//! # Line Format
//!
//! Packet records follow this general format:
//! ```text
//! <timestamp>.<frac>  <source>  <R|T>  <CALLSIGN>>PATH,PATH:<payload>
//! ```
//!
//! Example:
//! ```text
//! 2024-01-01 12:00:00.123 VA3KWJ-10 R TESTCALL>APRS,WIDE1-1:!4903.50N/07201.75W-hello
//! ```
//!
//! The payload is everything after the final `:`. Position extraction and
//! comment extraction are independent passes over it: a frame can carry both
//! a structured position and a trailing free-text comment.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use nom::{
    IResult, Parser,
    bytes::complete::{take, take_while1},
    character::complete::{char, digit1, multispace1, one_of},
    combinator::{map_res, rest, value},
};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::coords::extract_position;
use crate::event::{Direction, HeardEvent};

/// Errors that can occur during parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Not a packet record: {0}")]
    InvalidFormat(String),

    #[error("Invalid local timestamp: {0}")]
    InvalidTime(String),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Payload leads with a structured marker (position, object, telemetry,
/// weather); comment extraction is suppressed for these.
const STRUCTURED_MARKERS: [char; 6] = ['!', '@', '=', ';', 'T', '#'];

/// Free-text suffix some trackers delimit with `>}` or `=}`.
static DELIMITED_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[>=]\}([^\x00-\x1F\x7F]{6,})$").expect("valid comment regex"));

/// Last-resort comment: a trailing run of at least 6 characters starting
/// with an alphanumeric.
static TRAILING_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z0-9].{5,})$").expect("valid comment regex"));

/// Check if a character is valid in a callsign (alphanumeric plus `-` for
/// SSID suffixes like `-10`).
fn is_callsign_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

/// Parse the `YYYY-MM-DD HH:MM:SS` prefix as naive local time.
fn parse_timestamp(input: &str) -> IResult<&str, NaiveDateTime> {
    map_res(take(19usize), |s: &str| {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    })
    .parse(input)
}

/// Parse and discard the fractional-seconds suffix.
fn parse_fraction(input: &str) -> IResult<&str, ()> {
    value((), (char('.'), digit1)).parse(input)
}

/// Parse the source token (an interface callsign or the `APRSIS` marker).
fn parse_source(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace()).parse(input)
}

/// Parse a complete packet record line.
///
/// # Example
///
/// ```
/// use aprx_dashboard::parser::parse_log_line;
/// use aprx_dashboard::event::Direction;
///
/// let line = "2024-01-01 12:00:00.000 VA3KWJ-10 R TESTCALL>APRS,WIDE1-1:!4903.50N/07201.75W-hello";
/// let event = parse_log_line(line).unwrap();
/// assert_eq!(event.callsign, "TESTCALL");
/// assert_eq!(event.direction, Direction::Received);
/// assert!(event.position.is_some());
/// ```
pub fn parse_log_line(input: &str) -> ParseResult<HeardEvent> {
    let line = input.trim_end();

    let result: IResult<&str, (NaiveDateTime, &str, char, &str, &str)> = (|input| {
        let (input, naive) = parse_timestamp(input)?;
        let (input, _) = parse_fraction(input)?;
        let (input, _) = multispace1(input)?;
        let (input, source) = parse_source(input)?;
        let (input, _) = multispace1(input)?;
        let (input, dir_char) = one_of("RT")(input)?;
        let (input, _) = multispace1(input)?;
        let (input, callsign) = take_while1(is_callsign_char)(input)?;
        let (input, _) = char('>')(input)?;
        let (input, tail) = rest(input)?;

        Ok((input, (naive, source, dir_char, callsign, tail)))
    })(line);

    let (_, (naive, source, dir_char, callsign, tail)) =
        result.map_err(|e| ParseError::InvalidFormat(format!("{:?}", e)))?;

    let timestamp: DateTime<Local> = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| ParseError::InvalidTime(naive.to_string()))?;

    let direction = Direction::from_char(dir_char)
        .ok_or_else(|| ParseError::InvalidFormat(line.to_string()))?;

    // Payload is everything after the final ':'; lines without one are still
    // valid packet records (no position, no comment).
    let payload = tail.rsplit_once(':').map(|(_, p)| p.trim());

    Ok(HeardEvent {
        callsign: callsign.to_ascii_uppercase(),
        source: source.to_ascii_uppercase(),
        direction,
        timestamp,
        position: payload.and_then(extract_position),
        comment: payload.and_then(extract_comment),
    })
}

/// Check if a line looks like a packet record (quick pre-filter).
///
/// This is a fast check to avoid running the full parser on status lines.
#[inline]
pub fn looks_like_packet(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() > 25
        && bytes[..4].iter().all(|b| b.is_ascii_digit())
        && bytes[4] == b'-'
}

/// Extract a human-readable comment from an APRS payload.
///
/// Structured frames (position, object, telemetry, weather) are skipped
/// entirely; for the rest, a delimited `>}` / `=}` suffix is preferred over
/// the trailing-run fallback.
pub fn extract_comment(payload: &str) -> Option<String> {
    if payload.starts_with(STRUCTURED_MARKERS) {
        return None;
    }

    if let Some(caps) = DELIMITED_COMMENT.captures(payload) {
        return Some(caps.get(1)?.as_str().trim().to_string());
    }

    TRAILING_COMMENT
        .captures(payload)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Parse every packet record out of an iterator of raw lines.
///
/// Non-matching lines are expected noise and skipped silently.
pub fn scan_lines<'a, I>(lines: I) -> Vec<HeardEvent>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter(|line| looks_like_packet(line))
        .filter_map(|line| parse_log_line(line).ok())
        .collect()
}

/// Read and parse a whole log file, oldest line first.
///
/// A missing or unreadable file is treated as empty input, never an error:
/// the dashboard keeps rendering on partial data.
pub fn scan_log(path: &Path) -> Vec<HeardEvent> {
    match fs::read_to_string(path) {
        Ok(content) => scan_lines(content.lines()),
        Err(e) => {
            debug!("Cannot read log {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
