//! Route endpoints given as place names or coordinates.

use anyhow::{anyhow, Result};
use saferoute_client::NominatimClient;
use saferoute_core::models::GeoPoint;

/// Parse `"lat,lng"`.
pub fn parse_lat_lng(raw: &str) -> Result<GeoPoint, String> {
    let (lat, lng) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lng\", got \"{}\"", raw))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude \"{}\"", lat.trim()))?;
    let lng: f64 = lng
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude \"{}\"", lng.trim()))?;
    let point = GeoPoint::new(lat, lng);
    if !point.is_valid() {
        return Err(format!("coordinate out of range: {}", point));
    }
    Ok(point)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    Place(String),
    Point(GeoPoint),
}

impl Endpoint {
    /// Pick whichever of the two flags was given.
    pub fn from_args(place: Option<String>, point: Option<GeoPoint>, flag: &str) -> Result<Self> {
        match (place, point) {
            (_, Some(point)) => Ok(Endpoint::Point(point)),
            (Some(place), None) if !place.trim().is_empty() => Ok(Endpoint::Place(place)),
            _ => Err(anyhow!("--{} needs a place name or coordinates", flag)),
        }
    }

    pub async fn resolve(&self, geocoder: &NominatimClient) -> Result<GeoPoint> {
        match self {
            Endpoint::Point(point) => Ok(*point),
            Endpoint::Place(place) => geocoder
                .geocode(place)
                .await?
                .ok_or_else(|| anyhow!("Location not found: {}", place)),
        }
    }
}
