//! APRS coordinate decoding and distance math.
//!
//! APRS packets carry positions in two encodings that both appear in real
//! logs, depending on the age of the tracker firmware:
//!
//! - Uncompressed sexagesimal tokens like `4903.50N` / `07201.75W`
//!   (`DDMM.mm` with a hemisphere letter, three degree digits for longitude).
//! - The base-91 "compressed" scheme, where four printable bytes each encode
//!   latitude and longitude as base-91 digits.
//!
//! Decoders here are total: malformed input yields `None`, never an error.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A decoded position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Matches an APRS sexagesimal coordinate token: degrees+minutes, a decimal
/// minute fraction, and a hemisphere letter.
static SEXAGESIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(\d\d\.\d+)([NSEW])").expect("valid coordinate regex"));

/// Uncompressed lat/lon pair anywhere in a payload. Any single separator
/// after the hemisphere is tolerated (some overlays put odd bytes there).
static UNCOMPRESSED_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{4,5}\.[0-9]{2}[NS]).?([0-9]{5}\.[0-9]{2}[EW])")
        .expect("valid position regex")
});

/// Decode a `DDMM.mmH` / `DDDMM.mmH` coordinate token to decimal degrees.
///
/// Latitude tokens carry a 2-digit degree field, longitude tokens 3 digits.
/// `S` and `W` hemispheres negate the result. Returns `None` when the token
/// does not match the expected shape.
///
/// # Example
///
/// ```
/// use aprx_dashboard::coords::decode_sexagesimal;
///
/// let lat = decode_sexagesimal("4903.50N", true).unwrap();
/// assert!((lat - 49.058333).abs() < 1e-5);
/// ```
pub fn decode_sexagesimal(token: &str, is_lat: bool) -> Option<f64> {
    let caps = SEXAGESIMAL.captures(token)?;

    let deg_digits = if is_lat { 2 } else { 3 };
    let deg_str = caps.get(1)?.as_str();
    let deg_str = &deg_str[..deg_digits.min(deg_str.len())];

    let deg: f64 = deg_str.parse().ok()?;
    let min: f64 = caps.get(2)?.as_str().parse().ok()?;

    let decimal = deg + min / 60.0;
    match caps.get(3)?.as_str() {
        "S" | "W" => Some(-decimal),
        _ => Some(decimal),
    }
}

/// Decode an APRS base-91 compressed position from the start of a payload.
///
/// Honors APRS framing to avoid false hits on things like `/A=` altitude
/// extensions: `!` and `=` data-type indicators place the symbol-table byte
/// at offset 1, while timestamped `@` and `/` forms place it at offset 8
/// (6-digit time plus a qualifier). The table byte must be `/` or `\`; the
/// next four bytes are latitude, the four after that longitude.
pub fn decode_compressed(payload: &str) -> Option<Position> {
    let bytes = payload.as_bytes();
    if bytes.len() < 9 {
        return None;
    }

    let table_at = match bytes[0] {
        b'!' | b'=' => 1,
        b'@' | b'/' => 8,
        _ => return None,
    };
    if table_at + 9 > bytes.len() {
        return None;
    }
    if bytes[table_at] != b'/' && bytes[table_at] != b'\\' {
        return None;
    }

    let y = base91(&bytes[table_at + 1..table_at + 5])?;
    let x = base91(&bytes[table_at + 5..table_at + 9])?;

    let latitude = 90.0 - y as f64 / 380926.0;
    let longitude = -180.0 + x as f64 / 190463.0;

    if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
        Some(Position::new(latitude, longitude))
    } else {
        None
    }
}

/// Combine four printable bytes as base-91 digits.
///
/// Bytes must sit in the printable range `!`..`{` ([33,123]); anything else
/// invalidates the whole block.
fn base91(block: &[u8]) -> Option<u32> {
    block.iter().try_fold(0u32, |acc, &b| {
        if (33..=123).contains(&b) {
            Some(acc * 91 + (b as u32 - 33))
        } else {
            None
        }
    })
}

/// Uncompressed position pair found anywhere in the payload.
fn extract_uncompressed(payload: &str) -> Option<Position> {
    let caps = UNCOMPRESSED_PAIR.captures(payload)?;
    let lat = decode_sexagesimal(caps.get(1)?.as_str(), true)?;
    let lon = decode_sexagesimal(caps.get(2)?.as_str(), false)?;
    Some(Position::new(lat, lon))
}

/// Ordered position extraction strategies, tried until one matches.
///
/// Uncompressed coordinates are preferred; the compressed form is only
/// consulted when no sexagesimal pair was found.
const STRATEGIES: &[fn(&str) -> Option<Position>] = &[extract_uncompressed, decode_compressed];

/// Extract a position from an APRS payload, trying each encoding in turn.
pub fn extract_position(payload: &str) -> Option<Position> {
    STRATEGIES.iter().find_map(|strategy| strategy(payload))
}

/// Great-circle distance between two points in kilometers, rounded to 0.1 km.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let (lat1, lon1) = (lat1.to_radians(), lon1.to_radians());
    let (lat2, lon2) = (lat2.to_radians(), lon2.to_radians());

    let delta_lat = lat2 - lat1;
    let delta_lon = lon2 - lon1;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    (EARTH_RADIUS_KM * c * 10.0).round() / 10.0
}
