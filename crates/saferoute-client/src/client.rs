//! Risk API HTTP client.

use anyhow::{Context, Result};
use reqwest::Client;
use saferoute_core::models::{GeoPoint, HeatmapResponse, PredictionResponse, RiskZone};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// HTTP client for the accident risk API (`/heatmap`, `/predict`).
#[derive(Clone)]
pub struct RiskApiClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
}

/// `GET /` status payload.
#[derive(Debug, Deserialize)]
pub struct ApiStatus {
    pub status: String,
    #[serde(default)]
    pub city: Option<String>,
}

impl RiskApiClient {
    /// Create a new risk API client.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_base(base_url.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check the API is online.
    pub async fn status(&self) -> Result<ApiStatus> {
        let url = format!("{}/", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach risk API")?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Risk API status failed: {}", response.status()));
        }

        response
            .json::<ApiStatus>()
            .await
            .context("Failed to parse risk API status")
    }

    /// Fetch every known high-risk location as a bulk snapshot.
    pub async fn fetch_heatmap(&self) -> Result<Vec<RiskZone>> {
        let url = format!("{}/heatmap", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch heatmap")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Heatmap request failed: {} {}", status, body));
        }

        let payload = response
            .json::<HeatmapResponse>()
            .await
            .context("Failed to parse heatmap response")?;

        let zones = payload.risk_zones();
        if zones.len() != payload.points.len() {
            tracing::warn!(
                "Skipped {} malformed heatmap point(s)",
                payload.points.len() - zones.len()
            );
        }
        tracing::debug!("Fetched {} risk zone(s)", zones.len());
        Ok(zones)
    }

    /// Score a single location.
    pub async fn predict(&self, point: GeoPoint) -> Result<PredictionResponse> {
        let url = format!("{}/predict", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("lat", point.lat), ("lon", point.lng)])
            .send()
            .await
            .context("Failed to request prediction")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Prediction request failed: {} {}", status, body));
        }

        response
            .json::<PredictionResponse>()
            .await
            .context("Failed to parse prediction response")
    }
}

pub(crate) fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
