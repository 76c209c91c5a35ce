//! Reverse geocoding of the station's home position.
//!
//! Asks the OpenStreetMap Nominatim service for a human-readable place name.
//! Strictly cosmetic: any failure (network, HTTP status, body shape) falls
//! back to a fixed label so the station page never errors because of it.

use serde::Deserialize;
use tracing::debug;

/// Label served when the lookup fails for any reason.
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/reverse";

/// Identify ourselves per the Nominatim usage policy.
const USER_AGENT: &str = concat!("aprx-dashboard/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<Address>,
}

/// Subset of the Nominatim address object we care about.
#[derive(Debug, Default, Deserialize)]
pub struct Address {
    neighbourhood: Option<String>,
    suburb: Option<String>,
    town: Option<String>,
    city_district: Option<String>,
    city: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
    state: Option<String>,
    province: Option<String>,
}

/// Pick the most specific locality name and append the region. Both must
/// resolve for a label; a locality with no state/province is not enough.
fn label_from(address: &Address) -> Option<String> {
    let locality = address
        .neighbourhood
        .as_deref()
        .or(address.suburb.as_deref())
        .or(address.town.as_deref())
        .or(address.city_district.as_deref())
        .or(address.city.as_deref())
        .or(address.village.as_deref())
        .or(address.hamlet.as_deref())?;

    let region = address.state.as_deref().or(address.province.as_deref())?;
    Some(format!("{}, {}", locality, region))
}

/// Fixed-precision coordinate label shown beside the place name.
pub fn coord_label(lat: f64, lon: f64) -> String {
    format!("{:.5}, {:.5}", lat, lon)
}

/// Resolve coordinates to a place label, falling back to
/// [`UNKNOWN_LOCATION`] on any failure.
pub async fn reverse_geocode(client: &reqwest::Client, lat: f64, lon: f64) -> String {
    match lookup(client, lat, lon).await {
        Ok(Some(label)) => label,
        Ok(None) => {
            debug!("Nominatim returned no usable address for {:.5},{:.5}", lat, lon);
            UNKNOWN_LOCATION.to_string()
        }
        Err(e) => {
            debug!("Reverse geocode failed: {}", e);
            UNKNOWN_LOCATION.to_string()
        }
    }
}

async fn lookup(
    client: &reqwest::Client,
    lat: f64,
    lon: f64,
) -> Result<Option<String>, reqwest::Error> {
    let response = client
        .get(NOMINATIM_URL)
        .query(&[
            ("format", "jsonv2"),
            ("lat", &lat.to_string()),
            ("lon", &lon.to_string()),
            ("zoom", "16"),
        ])
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await?
        .error_for_status()?;

    let body: ReverseResponse = response.json().await?;
    Ok(body.address.as_ref().and_then(label_from))
}
