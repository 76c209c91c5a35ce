//! HTTP API for the dashboard frontend.
//!
//! Every endpoint re-derives its answer from the files on disk: the daemon
//! config and the RF log are re-read per request, so the dashboard always
//! reflects the live state without any cache invalidation. The only fatal
//! error is failing to bind the listening socket.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{
    self, RecentCall, RecentSummary, SourceFilter, StationSnapshot, StatsReport, TimeRange,
};
use crate::aprx::{StationConfig, resolve_station};
use crate::config::Config;
use crate::coords::Position;
use crate::geocode;
use crate::parser::scan_log;
use crate::tail::{LogChunk, fetch_since};

/// Default window for the recent-calls view.
const DEFAULT_RECENT_RANGE: TimeRange = TimeRange::H24;

/// Default window for the stats view.
const DEFAULT_STATS_RANGE: TimeRange = TimeRange::D7;

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    http: reqwest::Client,
}

type ApiError = (StatusCode, String);

fn bad_request(message: impl ToString) -> ApiError {
    (StatusCode::BAD_REQUEST, message.to_string())
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/station", get(station))
        .route("/api/recent", get(recent))
        .route("/api/stations", get(stations))
        .route("/api/stats", get(stats))
        .route("/api/log", get(log))
        .with_state(state)
}

/// Bind and serve the API until the process exits.
pub async fn serve(config: Config) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.bind_port));
    let state = AppState {
        config: Arc::new(config),
        http: reqwest::Client::new(),
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Dashboard API listening on {}", addr);

    axum::serve(listener, router(state))
        .await
        .context("HTTP server error")?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct StationResponse {
    callsign: String,
    role: String,
    interfaces: Vec<String>,
    home: Option<Position>,
    location: Option<String>,
    coordinates: Option<String>,
}

async fn station(State(state): State<AppState>) -> Json<StationResponse> {
    let daemon = StationConfig::load(&state.config.aprx_config_path);
    let resolved = resolve_station(&daemon, &state.config);

    let (location, coordinates) = match resolved.home {
        Some(home) => (
            Some(geocode::reverse_geocode(&state.http, home.latitude, home.longitude).await),
            Some(geocode::coord_label(home.latitude, home.longitude)),
        ),
        None => (None, None),
    };

    Json(StationResponse {
        callsign: resolved.callsign,
        role: resolved.role.to_string(),
        interfaces: resolved.interfaces,
        home: resolved.home,
        location,
        coordinates,
    })
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    range: Option<String>,
    source: Option<String>,
}

#[derive(Debug, Serialize)]
struct RecentResponse {
    range: TimeRange,
    summary: RecentSummary,
    calls: Vec<RecentCall>,
}

async fn recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<RecentResponse>, ApiError> {
    let range = parse_range(query.range.as_deref(), DEFAULT_RECENT_RANGE)?;
    let filter = parse_filter(query.source.as_deref())?;

    let daemon = StationConfig::load(&state.config.aprx_config_path);
    let resolved = resolve_station(&daemon, &state.config);
    let events = scan_log(&state.config.rf_log_path);
    debug!("Scanned {} events from RF log", events.len());

    let calls = aggregate::build_recent_calls(
        &events,
        range,
        resolved.home,
        filter,
        &resolved.interfaces,
        Local::now(),
    );
    let summary = aggregate::summarize_recent(&calls);

    Ok(Json(RecentResponse {
        range,
        summary,
        calls,
    }))
}

#[derive(Debug, Deserialize)]
struct StationsQuery {
    source: Option<String>,
}

#[derive(Debug, Serialize)]
struct StationsResponse {
    stations: Vec<StationSnapshot>,
}

async fn stations(
    State(state): State<AppState>,
    Query(query): Query<StationsQuery>,
) -> Result<Json<StationsResponse>, ApiError> {
    let filter = parse_filter(query.source.as_deref())?;

    let daemon = StationConfig::load(&state.config.aprx_config_path);
    let resolved = resolve_station(&daemon, &state.config);
    let events = scan_log(&state.config.rf_log_path);

    let mut stations = aggregate::build_station_snapshots(&events, filter);
    if let Some(home) = resolved.home {
        stations.push(aggregate::self_snapshot(
            &resolved.callsign,
            home,
            Local::now(),
        ));
    }

    Ok(Json(StationsResponse { stations }))
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    range: Option<String>,
}

async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsReport>, ApiError> {
    let range = parse_range(query.range.as_deref(), DEFAULT_STATS_RANGE)?;

    let daemon = StationConfig::load(&state.config.aprx_config_path);
    let events = scan_log(&state.config.rf_log_path);

    Ok(Json(aggregate::build_stats(
        &events,
        range,
        &daemon.interfaces,
        Local::now(),
    )))
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    log: Option<String>,
    #[serde(default)]
    offset: u64,
}

async fn log(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<LogChunk>, ApiError> {
    let path = match query.log.as_deref().unwrap_or("rf") {
        "rf" => &state.config.rf_log_path,
        "daemon" => &state.config.daemon_log_path,
        other => return Err(bad_request(format!("Unknown log: {}", other))),
    };

    match fetch_since(path, query.offset) {
        Ok(chunk) => Ok(Json(chunk)),
        Err(e) => {
            debug!("Cannot read log {}: {}", path.display(), e);
            Err((
                StatusCode::NOT_FOUND,
                format!("Log not readable: {}", path.display()),
            ))
        }
    }
}

fn parse_range(raw: Option<&str>, default: TimeRange) -> Result<TimeRange, ApiError> {
    match raw {
        None | Some("") => Ok(default),
        Some(raw) => raw.parse().map_err(bad_request),
    }
}

fn parse_filter(raw: Option<&str>) -> Result<SourceFilter, ApiError> {
    match raw {
        None => Ok(SourceFilter::Both),
        Some(raw) => raw.parse().map_err(bad_request),
    }
}
