//! Derived views over parsed heard-events.
//!
//! Three independent projections feed the dashboard pages:
//!
//! - a filtered, deduplicated recent-calls feed with per-call distance,
//! - a latest-position-per-callsign station list for the map,
//! - time-bucketed RX/TX counts per interface for the charts.
//!
//! None of these are stateful: each takes the full event list (derived fresh
//! from the log file per request) and is a pure fold, so re-running the
//! pipeline on an unchanged log yields identical output.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Local};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::coords::{Position, haversine_km};
use crate::event::{Direction, HeardEvent, SourceClass};

/// Time-window selector shared by the recent-calls and stats views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeRange {
    H1,
    H2,
    H4,
    H6,
    H12,
    H24,
    D1,
    D7,
    D14,
    D30,
    All,
}

#[derive(Debug, Error)]
#[error("Unknown time range: {0}")]
pub struct InvalidTimeRange(String);

impl FromStr for TimeRange {
    type Err = InvalidTimeRange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1h" => Ok(TimeRange::H1),
            "2h" => Ok(TimeRange::H2),
            "4h" => Ok(TimeRange::H4),
            "6h" => Ok(TimeRange::H6),
            "12h" => Ok(TimeRange::H12),
            "24h" => Ok(TimeRange::H24),
            "1d" => Ok(TimeRange::D1),
            "7d" => Ok(TimeRange::D7),
            "14d" => Ok(TimeRange::D14),
            "30d" => Ok(TimeRange::D30),
            "all" => Ok(TimeRange::All),
            other => Err(InvalidTimeRange(other.to_string())),
        }
    }
}

impl TimeRange {
    /// Window width in minutes; `None` means unbounded.
    pub fn minutes(self) -> Option<i64> {
        match self {
            TimeRange::H1 => Some(60),
            TimeRange::H2 => Some(120),
            TimeRange::H4 => Some(240),
            TimeRange::H6 => Some(360),
            TimeRange::H12 => Some(720),
            TimeRange::H24 | TimeRange::D1 => Some(1440),
            TimeRange::D7 => Some(10_080),
            TimeRange::D14 => Some(20_160),
            TimeRange::D30 => Some(43_200),
            TimeRange::All => None,
        }
    }

    /// Hourly bucket granularity for windows up to one day, daily beyond.
    pub fn is_hourly(self) -> bool {
        matches!(self.minutes(), Some(m) if m <= 1440)
    }

    /// Oldest timestamp still inside the window, relative to `now`.
    pub fn cutoff(self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        self.minutes().map(|m| now - Duration::minutes(m))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::H1 => "1h",
            TimeRange::H2 => "2h",
            TimeRange::H4 => "4h",
            TimeRange::H6 => "6h",
            TimeRange::H12 => "12h",
            TimeRange::H24 => "24h",
            TimeRange::D1 => "1d",
            TimeRange::D7 => "7d",
            TimeRange::D14 => "14d",
            TimeRange::D30 => "30d",
            TimeRange::All => "all",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TimeRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Source classification filter: everything, RF only, or APRS-IS only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceFilter {
    #[default]
    Both,
    Rf,
    AprsIs,
}

#[derive(Debug, Error)]
#[error("Unknown source filter: {0}")]
pub struct InvalidSourceFilter(String);

impl FromStr for SourceFilter {
    type Err = InvalidSourceFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "both" => Ok(SourceFilter::Both),
            "rf" => Ok(SourceFilter::Rf),
            "aprsis" | "aprs-is" => Ok(SourceFilter::AprsIs),
            other => Err(InvalidSourceFilter(other.to_string())),
        }
    }
}

impl SourceFilter {
    pub fn matches(self, class: SourceClass) -> bool {
        match self {
            SourceFilter::Both => true,
            SourceFilter::Rf => class == SourceClass::Rf,
            SourceFilter::AprsIs => class == SourceClass::AprsIs,
        }
    }
}

/// Human-facing source label for a recent call: a configured RF interface,
/// or the internet gateway feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallLabel {
    Rf(String),
    AprsIs,
}

impl fmt::Display for CallLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallLabel::Rf(iface) => write!(f, "RF: {}", iface),
            CallLabel::AprsIs => write!(f, "APRS-IS"),
        }
    }
}

impl Serialize for CallLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One row of the recent-calls table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentCall {
    pub callsign: String,

    /// Raw source token from the log.
    pub source: String,

    /// Display label: `RF: <iface>` when the source is a configured RF
    /// interface, `APRS-IS` otherwise.
    pub label: CallLabel,

    pub timestamp: DateTime<Local>,

    pub position: Option<Position>,

    /// Distance from home in km, when both positions are known.
    pub distance_km: Option<f64>,

    pub comment: Option<String>,
}

/// Unique-callsign counts across a recent-calls listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecentSummary {
    pub total: usize,
    pub rf: usize,
    pub aprsis: usize,
}

/// Build the recent-calls feed: Received events inside the trailing window,
/// optionally restricted by source classification, newest first.
///
/// The sort is stable, so events sharing a timestamp keep their original log
/// order. Transmitted (digipeated) lines never appear here.
pub fn build_recent_calls(
    events: &[HeardEvent],
    range: TimeRange,
    home: Option<Position>,
    filter: SourceFilter,
    rf_interfaces: &[String],
    now: DateTime<Local>,
) -> Vec<RecentCall> {
    let cutoff = range.cutoff(now);

    let mut calls: Vec<RecentCall> = events
        .iter()
        .filter(|e| e.direction == Direction::Received)
        .filter(|e| cutoff.is_none_or(|c| e.timestamp >= c))
        .filter(|e| filter.matches(e.source_class()))
        .map(|e| {
            let label = if rf_interfaces
                .iter()
                .any(|iface| iface.eq_ignore_ascii_case(&e.source))
            {
                CallLabel::Rf(e.source.clone())
            } else {
                CallLabel::AprsIs
            };

            let distance_km = match (home, e.position) {
                (Some(h), Some(p)) => {
                    Some(haversine_km(h.latitude, h.longitude, p.latitude, p.longitude))
                }
                _ => None,
            };

            RecentCall {
                callsign: e.callsign.clone(),
                source: e.source.clone(),
                label,
                timestamp: e.timestamp,
                position: e.position,
                distance_km,
                comment: e.comment.clone(),
            }
        })
        .collect();

    calls.sort_by_key(|c| Reverse(c.timestamp));
    calls
}

/// Count unique callsigns overall and split by RF / APRS-IS label.
pub fn summarize_recent(calls: &[RecentCall]) -> RecentSummary {
    let mut all = HashSet::new();
    let mut rf = HashSet::new();
    let mut aprsis = HashSet::new();

    for call in calls {
        all.insert(call.callsign.as_str());
        match call.label {
            CallLabel::Rf(_) => rf.insert(call.callsign.as_str()),
            CallLabel::AprsIs => aprsis.insert(call.callsign.as_str()),
        };
    }

    RecentSummary {
        total: all.len(),
        rf: rf.len(),
        aprsis: aprsis.len(),
    }
}

/// Classification of a station-list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotClass {
    Rf,
    Aprsis,
    #[serde(rename = "self")]
    Own,
}

/// One row of the map/station list: the latest positioned sighting of a
/// callsign.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSnapshot {
    pub callsign: String,
    pub lat: f64,
    pub lon: f64,
    pub source: SnapshotClass,
    pub last_seen: i64,
}

/// Build the latest-position-per-callsign station list.
///
/// Walks Received events newest-first and keeps the first positioned event
/// per callsign; callsigns that never reported a position are absent. The
/// result is sorted by callsign for stable output.
pub fn build_station_snapshots(events: &[HeardEvent], filter: SourceFilter) -> Vec<StationSnapshot> {
    let mut latest: HashMap<String, StationSnapshot> = HashMap::new();

    // Events arrive in log order (oldest first); iterate in reverse so the
    // first hit per callsign is the newest.
    for event in events.iter().rev() {
        if event.direction != Direction::Received {
            continue;
        }
        if !filter.matches(event.source_class()) {
            continue;
        }
        let Some(pos) = event.position else {
            continue;
        };

        let callsign = event.callsign.to_ascii_uppercase();
        latest.entry(callsign.clone()).or_insert(StationSnapshot {
            callsign,
            lat: pos.latitude,
            lon: pos.longitude,
            source: match event.source_class() {
                SourceClass::Rf => SnapshotClass::Rf,
                SourceClass::AprsIs => SnapshotClass::Aprsis,
            },
            last_seen: event.unix_time(),
        });
    }

    let mut snapshots: Vec<StationSnapshot> = latest.into_values().collect();
    snapshots.sort_by(|a, b| a.callsign.cmp(&b.callsign));
    snapshots
}

/// Synthetic snapshot for the operator's own station, built from the
/// resolved home coordinates. Never deduplicated against heard events.
pub fn self_snapshot(callsign: &str, home: Position, now: DateTime<Local>) -> StationSnapshot {
    StationSnapshot {
        callsign: callsign.to_ascii_uppercase(),
        lat: home.latitude,
        lon: home.longitude,
        source: SnapshotClass::Own,
        last_seen: now.timestamp(),
    }
}

/// RX/TX counts for one time bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirCounts {
    pub rx: u64,
    pub tx: u64,
}

/// Time-bucketed RX/TX statistics per RF interface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub range: TimeRange,
    pub hourly: bool,
    pub interfaces: Vec<String>,

    /// Sorted bucket keys, pre-seeded plus populated.
    pub buckets: Vec<String>,

    /// interface -> bucket key -> counts.
    pub counts: BTreeMap<String, BTreeMap<String, DirCounts>>,
}

fn bucket_key(t: DateTime<Local>, hourly: bool) -> String {
    if hourly {
        t.format("%Y-%m-%d %H:00").to_string()
    } else {
        t.format("%Y-%m-%d").to_string()
    }
}

/// Build RX/TX statistics across time buckets for the enabled interfaces.
///
/// Every bucket in the window is pre-populated with zero counts so charts
/// render gaps as zero rather than missing points. Both Received and
/// Transmitted lines count here, unlike the recent-calls feed.
pub fn build_stats(
    events: &[HeardEvent],
    range: TimeRange,
    interfaces: &[String],
    now: DateTime<Local>,
) -> StatsReport {
    let hourly = range.is_hourly();
    let step = if hourly {
        Duration::hours(1)
    } else {
        Duration::days(1)
    };

    // An unbounded range is anchored at the earliest event.
    let cutoff = range
        .cutoff(now)
        .or_else(|| events.iter().map(|e| e.timestamp).min())
        .unwrap_or(now);

    let interfaces: Vec<String> = interfaces
        .iter()
        .map(|iface| iface.to_ascii_uppercase())
        .collect();

    let mut buckets: BTreeSet<String> = BTreeSet::new();
    let mut t = now;
    while t > cutoff {
        buckets.insert(bucket_key(t, hourly));
        t -= step;
    }

    let mut counts: BTreeMap<String, BTreeMap<String, DirCounts>> = BTreeMap::new();
    for iface in &interfaces {
        counts.insert(iface.clone(), BTreeMap::new());
    }

    for event in events {
        if event.timestamp < cutoff {
            continue;
        }
        let Some(per_iface) = counts.get_mut(&event.source) else {
            continue;
        };

        let bucket = bucket_key(event.timestamp, hourly);
        buckets.insert(bucket.clone());

        let entry = per_iface.entry(bucket).or_default();
        match event.direction {
            Direction::Received => entry.rx += 1,
            Direction::Transmitted => entry.tx += 1,
        }
    }

    // Zero-fill so every interface has every bucket.
    for per_iface in counts.values_mut() {
        for bucket in &buckets {
            per_iface.entry(bucket.clone()).or_default();
        }
    }

    StatsReport {
        range,
        hourly,
        interfaces,
        buckets: buckets.into_iter().collect(),
        counts,
    }
}
