//! Shared application state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use dashmap::DashMap;
use saferoute_client::OsrmClient;
use saferoute_core::models::{GeoPoint, PredictionResponse};
use saferoute_core::{
    LiveContextProvider, LogisticDistanceModel, RiskError, RiskPredictor, RiskRules,
    SimulatedLiveContext,
};
use saferoute_overlay::{RiskZoneSource, RiskZoneStore, RouteProvider};

use crate::cache::{prune_cache, CacheEntry};
use crate::config::Config;
use crate::dataset::DatasetZones;

/// Predictions are shared by every request within the same ~100 m cell.
const CELL_SCALE: f64 = 1_000.0;

/// Predictor with the live feed chosen at startup.
pub type ServerPredictor = RiskPredictor<LogisticDistanceModel, Box<dyn LiveContextProvider>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
    lat: i64,
    lng: i64,
}

impl CellKey {
    pub fn for_point(point: &GeoPoint) -> Self {
        Self {
            lat: (point.lat * CELL_SCALE).round() as i64,
            lng: (point.lng * CELL_SCALE).round() as i64,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedPrediction {
    response: PredictionResponse,
    fetched_at: Instant,
}

impl CacheEntry for CachedPrediction {
    fn fetched_at(&self) -> Instant {
        self.fetched_at
    }
}

pub struct AppState {
    config: Config,
    zones: Arc<RiskZoneStore>,
    routes: Arc<dyn RouteProvider>,
    predictor: ServerPredictor,
    predictions: DashMap<CellKey, CachedPrediction>,
    overlay_sessions: AtomicUsize,
}

impl AppState {
    /// State backed by the dataset file and the configured routing engine.
    pub fn new(config: Config) -> Result<Self> {
        let zones = Arc::new(DatasetZones::new(config.data_path.clone()));
        let routes = Arc::new(OsrmClient::new(&config.osrm_url, &config.osrm_profile)?);
        let predictor = RiskPredictor::new(
            LogisticDistanceModel::default(),
            Box::new(SimulatedLiveContext::new()) as Box<dyn LiveContextProvider>,
            RiskRules::default(),
        );
        Ok(Self::with_sources(config, zones, routes, predictor))
    }

    pub fn with_sources(
        config: Config,
        zones: Arc<dyn RiskZoneSource>,
        routes: Arc<dyn RouteProvider>,
        predictor: ServerPredictor,
    ) -> Self {
        Self {
            config,
            zones: Arc::new(RiskZoneStore::new(zones)),
            routes,
            predictor,
            predictions: DashMap::new(),
            overlay_sessions: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn zones(&self) -> &Arc<RiskZoneStore> {
        &self.zones
    }

    pub fn routes(&self) -> Arc<dyn RouteProvider> {
        self.routes.clone()
    }

    pub fn predictor(&self) -> &ServerPredictor {
        &self.predictor
    }

    /// Score a point, reusing a recent result for the same cell.
    pub fn predict(&self, point: &GeoPoint) -> Result<PredictionResponse, RiskError> {
        if !point.is_valid() {
            return Err(RiskError::InvalidCoordinate(point.to_string()));
        }
        let key = CellKey::for_point(point);
        let ttl = Duration::from_secs(self.config.prediction_cache_ttl_s);

        if let Some(entry) = self.predictions.get(&key) {
            if entry.fetched_at.elapsed() <= ttl {
                return Ok(entry.response.clone());
            }
        }

        let response = self.predictor.predict(point)?;
        self.predictions.insert(
            key,
            CachedPrediction {
                response: response.clone(),
                fetched_at: Instant::now(),
            },
        );
        if self.predictions.len() > self.config.prediction_cache_max_entries {
            prune_cache(
                &self.predictions,
                self.config.prediction_cache_max_entries,
                ttl,
            );
        }
        Ok(response)
    }

    pub fn cached_predictions(&self) -> usize {
        self.predictions.len()
    }

    pub fn overlay_session_opened(&self) -> usize {
        self.overlay_sessions.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn overlay_session_closed(&self) {
        self.overlay_sessions.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn overlay_sessions(&self) -> usize {
        self.overlay_sessions.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saferoute_overlay::StaticRiskZones;

    #[test]
    fn predict_checks_coordinate_before_cache() {
        let state = AppState::with_sources(
            Config::from_env(),
            Arc::new(StaticRiskZones::new(Vec::new())),
            Arc::new(OsrmClient::new("http://127.0.0.1:1", "driving").unwrap()),
            RiskPredictor::new(
                LogisticDistanceModel::default(),
                Box::new(SimulatedLiveContext::seeded(7)) as Box<dyn LiveContextProvider>,
                RiskRules::default(),
            ),
        );
        assert!(state.predict(&GeoPoint::new(0.0, 0.0)).is_ok());

        let err = state.predict(&GeoPoint::new(f64::NAN, f64::NAN)).unwrap_err();
        assert!(matches!(err, RiskError::InvalidCoordinate(_)));
        assert_eq!(state.cached_predictions(), 1);
    }

    #[test]
    fn nearby_points_share_a_cell() {
        let a = CellKey::for_point(&GeoPoint::new(12.97161, 77.59472));
        let b = CellKey::for_point(&GeoPoint::new(12.97189, 77.59461));
        let c = CellKey::for_point(&GeoPoint::new(12.9736, 77.5946));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
