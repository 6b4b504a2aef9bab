//! Place name lookup against a Nominatim instance.

use anyhow::{Context, Result};
use reqwest::Client;
use saferoute_core::models::GeoPoint;
use serde::Deserialize;
use std::time::Duration;

use crate::client::trim_base;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
// Nominatim's usage policy rejects requests without an identifying agent.
const USER_AGENT: &str = concat!("saferoute/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct NominatimClient {
    client: Client,
    base_url: String,
    /// Appended to every query to keep matches inside one city
    city_context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    /// Nominatim returns coordinates as strings
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

impl NominatimClient {
    pub fn new(base_url: impl Into<String>, city_context: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: trim_base(base_url.into()),
            city_context: city_context.filter(|city| !city.trim().is_empty()),
        })
    }

    pub(crate) fn search_query(&self, query: &str) -> String {
        match self.city_context.as_deref() {
            Some(city) => format!("{}, {}", query.trim(), city),
            None => query.trim().to_string(),
        }
    }

    /// Resolve a place name to its best match. `Ok(None)` when nothing matched.
    pub async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>> {
        let url = format!("{}/search", self.base_url);
        let q = self.search_query(query);

        let response = self
            .client
            .get(&url)
            .query(&[("format", "json"), ("q", q.as_str())])
            .send()
            .await
            .context("Failed to reach geocoder")?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Geocoding failed: {}", response.status()));
        }

        let hits = response
            .json::<Vec<SearchHit>>()
            .await
            .context("Failed to parse geocoding response")?;

        let point = first_point(&hits)?;
        match (&point, hits.first().and_then(|hit| hit.display_name.as_deref())) {
            (Some(point), Some(name)) => {
                tracing::debug!("Geocoded '{}' to {} ({})", q, point, name)
            }
            (None, _) => tracing::info!("Location not found: {}", q),
            _ => {}
        }
        Ok(point)
    }
}

fn first_point(hits: &[SearchHit]) -> Result<Option<GeoPoint>> {
    let Some(hit) = hits.first() else {
        return Ok(None);
    };
    let lat: f64 = hit.lat.parse().context("Invalid latitude from geocoder")?;
    let lng: f64 = hit.lon.parse().context("Invalid longitude from geocoder")?;
    Ok(Some(GeoPoint::new(lat, lng)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_context_is_appended() {
        let client =
            NominatimClient::new(DEFAULT_NOMINATIM_URL, Some("Bengaluru".to_string())).unwrap();
        assert_eq!(client.search_query(" Hebbal "), "Hebbal, Bengaluru");

        let bare = NominatimClient::new(DEFAULT_NOMINATIM_URL, Some("  ".to_string())).unwrap();
        assert_eq!(bare.search_query("Hebbal"), "Hebbal");
    }

    #[test]
    fn first_hit_is_parsed_from_strings() {
        let hits: Vec<SearchHit> = serde_json::from_str(
            r#"[{"lat":"13.0358","lon":"77.5970","display_name":"Hebbal"},{"lat":"1","lon":"2"}]"#,
        )
        .unwrap();
        let point = first_point(&hits).unwrap().unwrap();
        assert_eq!(point, GeoPoint::new(13.0358, 77.597));
        assert!(first_point(&[]).unwrap().is_none());
    }
}
