//! Server configuration from environment.

use std::env;
use std::path::PathBuf;

use saferoute_client::DEFAULT_OSRM_URL;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Labelled road nodes (JSON array) backing `/heatmap` and the overlay
    pub data_path: PathBuf,
    pub osrm_url: String,
    pub osrm_profile: String,
    pub city: String,
    pub prediction_cache_ttl_s: u64,
    pub prediction_cache_max_entries: usize,
    pub risk_refresh_s: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: env::var("SAFEROUTE_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8000),
            data_path: env::var("SAFEROUTE_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/processed/training_data.json")),
            osrm_url: env::var("OSRM_URL").unwrap_or_else(|_| DEFAULT_OSRM_URL.to_string()),
            osrm_profile: env::var("OSRM_PROFILE").unwrap_or_else(|_| "driving".to_string()),
            city: env::var("SAFEROUTE_CITY").unwrap_or_else(|_| "Bengaluru".to_string()),
            prediction_cache_ttl_s: env::var("SAFEROUTE_PREDICTION_CACHE_TTL_S")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            prediction_cache_max_entries: env::var("SAFEROUTE_PREDICTION_CACHE_MAX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),
            risk_refresh_s: env::var("SAFEROUTE_RISK_REFRESH_S")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(300),
        }
    }
}
