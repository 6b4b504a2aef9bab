//! OSRM routing engine client.
//!
//! Turns a (start, end) pair into the ordered coordinates of a drivable
//! path. Only the first (best) route is used.

use anyhow::{Context, Result};
use reqwest::Client;
use saferoute_core::models::GeoPoint;
use serde::Deserialize;
use std::time::Duration;

use crate::client::trim_base;

pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";
const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Clone)]
pub struct OsrmClient {
    client: Client,
    base_url: String,
    profile: String,
}

/// Best route returned by the engine.
#[derive(Debug, Clone)]
pub struct OsrmRoute {
    pub points: Vec<GeoPoint>,
    pub distance_m: f64,
    pub duration_s: f64,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRouteBody>,
}

#[derive(Debug, Deserialize)]
struct OsrmRouteBody {
    geometry: OsrmGeometry,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// GeoJSON order: [lng, lat]
    coordinates: Vec<[f64; 2]>,
}

impl OsrmClient {
    pub fn new(base_url: impl Into<String>, profile: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: trim_base(base_url.into()),
            profile: profile.into(),
        })
    }

    pub(crate) fn route_url(&self, start: &GeoPoint, end: &GeoPoint) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, self.profile, start.lng, start.lat, end.lng, end.lat
        )
    }

    /// Compute a route. `Ok(None)` means the engine found no path.
    pub async fn route(&self, start: GeoPoint, end: GeoPoint) -> Result<Option<OsrmRoute>> {
        let url = self.route_url(&start, &end);
        tracing::debug!("Requesting route {} -> {}", start, end);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach routing engine")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read routing response")?;

        // OSRM reports NoRoute with a 400 and a JSON body; only give up on
        // bodies that are not OSRM JSON at all.
        let payload: OsrmResponse = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(err) if status.is_success() => {
                return Err(err).context("Failed to parse routing response");
            }
            Err(_) => {
                return Err(anyhow::anyhow!("Routing request failed: {} {}", status, body));
            }
        };

        Ok(extract_route(payload))
    }
}

fn extract_route(payload: OsrmResponse) -> Option<OsrmRoute> {
    if payload.code != "Ok" {
        tracing::info!(
            "Routing engine returned {}: {}",
            payload.code,
            payload.message.as_deref().unwrap_or("no message")
        );
        return None;
    }

    let best = payload.routes.into_iter().next()?;
    let points: Vec<GeoPoint> = best
        .geometry
        .coordinates
        .iter()
        .map(|[lng, lat]| GeoPoint::new(*lat, *lng))
        .filter(GeoPoint::is_finite)
        .collect();

    if points.is_empty() {
        return None;
    }

    Some(OsrmRoute {
        points,
        distance_m: best.distance,
        duration_s: best.duration,
    })
}
