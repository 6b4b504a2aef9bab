//! Point risk prediction.
//!
//! Combines a historical base probability (distance to the nearest
//! blackspot) with live traffic and weather penalties. This score is a
//! separate signal from the route proximity check in `segmentation`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use crate::blackspots::{nearest_in, Blackspot, BLACKSPOTS};
use crate::error::RiskError;
use crate::models::{GeoPoint, LiveData, PredictionResponse, RiskLevel, TrafficStatus, Weather};
use crate::rules::RiskRules;

/// Junction complexity assumed when the caller has no road graph.
pub const DEFAULT_JUNCTION_COMPLEXITY: u32 = 3;

/// Historical probability that a location is high risk.
pub trait BaseRiskModel: Send + Sync {
    fn probability(&self, dist_to_blackspot_km: f64, junction_complexity: u32) -> f64;
}

/// Logistic decay around the blackspot labelling radius.
#[derive(Debug, Clone)]
pub struct LogisticDistanceModel {
    pub midpoint_km: f64,
    pub scale_km: f64,
    /// Log-odds added per approach beyond the default complexity
    pub junction_weight: f64,
}

impl Default for LogisticDistanceModel {
    fn default() -> Self {
        Self {
            midpoint_km: 0.5,
            scale_km: 0.1,
            junction_weight: 0.5,
        }
    }
}

impl BaseRiskModel for LogisticDistanceModel {
    fn probability(&self, dist_to_blackspot_km: f64, junction_complexity: u32) -> f64 {
        if !dist_to_blackspot_km.is_finite() {
            return 0.0;
        }
        let scale = self.scale_km.max(1e-6);
        let junction = junction_complexity as f64 - DEFAULT_JUNCTION_COMPLEXITY as f64;
        let logit =
            (self.midpoint_km - dist_to_blackspot_km) / scale + self.junction_weight * junction;
        1.0 / (1.0 + (-logit).exp())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveContext {
    pub traffic: TrafficStatus,
    pub weather: Weather,
}

/// Source of current traffic/weather conditions at a point.
pub trait LiveContextProvider: Send + Sync {
    fn live_context(&self, point: &GeoPoint) -> LiveContext;
}

/// Stand-in for a live traffic feed.
///
/// Draws traffic with weights 40/30/30 (free flow/moderate/congested);
/// weather is always clear.
pub struct SimulatedLiveContext {
    rng: Mutex<StdRng>,
}

impl SimulatedLiveContext {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for SimulatedLiveContext {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveContextProvider for SimulatedLiveContext {
    fn live_context(&self, _point: &GeoPoint) -> LiveContext {
        let roll = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            rng.random_range(0..100u32)
        };
        let traffic = match roll {
            0..=39 => TrafficStatus::FreeFlow,
            40..=69 => TrafficStatus::Moderate,
            _ => TrafficStatus::Congested,
        };
        LiveContext {
            traffic,
            weather: Weather::Clear,
        }
    }
}

/// Fixed conditions, for replays and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedLiveContext(pub LiveContext);

impl LiveContextProvider for FixedLiveContext {
    fn live_context(&self, _point: &GeoPoint) -> LiveContext {
        self.0
    }
}

impl LiveContextProvider for Box<dyn LiveContextProvider> {
    fn live_context(&self, point: &GeoPoint) -> LiveContext {
        (**self).live_context(point)
    }
}

/// Hybrid risk scorer: historical model plus live penalties.
pub struct RiskPredictor<M = LogisticDistanceModel, C = SimulatedLiveContext> {
    model: M,
    live: C,
    rules: RiskRules,
    blackspots: &'static [Blackspot],
}

impl Default for RiskPredictor {
    fn default() -> Self {
        Self::new(
            LogisticDistanceModel::default(),
            SimulatedLiveContext::new(),
            RiskRules::default(),
        )
    }
}

impl<M: BaseRiskModel, C: LiveContextProvider> RiskPredictor<M, C> {
    pub fn new(model: M, live: C, rules: RiskRules) -> Self {
        Self {
            model,
            live,
            rules,
            blackspots: BLACKSPOTS,
        }
    }

    pub fn with_blackspots(mut self, blackspots: &'static [Blackspot]) -> Self {
        self.blackspots = blackspots;
        self
    }

    pub fn rules(&self) -> &RiskRules {
        &self.rules
    }

    pub fn predict(&self, point: &GeoPoint) -> Result<PredictionResponse, RiskError> {
        if !point.is_valid() {
            return Err(RiskError::InvalidCoordinate(point.to_string()));
        }
        let rules = &self.rules;

        let (spot_name, dist_km, base_probability) = match nearest_in(self.blackspots, point) {
            Some(nearest) => {
                let base = self
                    .model
                    .probability(nearest.distance_km, DEFAULT_JUNCTION_COMPLEXITY);
                (nearest.name, nearest.distance_km, base)
            }
            None => ("None".to_string(), 0.0, 0.0),
        };

        let live = self.live.live_context(point);
        let mut live_modifier = 0.0;
        let mut factors = Vec::new();

        if base_probability > rules.proximity_factor_above {
            factors.push(format!("Proximity to {} ({:.2}km)", spot_name, dist_km));
        }

        match live.traffic {
            TrafficStatus::Congested => {
                live_modifier += rules.congested_penalty;
                factors.push("High Traffic Congestion".to_string());
            }
            TrafficStatus::Moderate => live_modifier += rules.moderate_penalty,
            TrafficStatus::FreeFlow => {}
        }

        if live.weather == Weather::Rain {
            live_modifier += rules.rain_penalty;
            factors.push("Wet Road Surfaces".to_string());
        }

        let score = (base_probability + live_modifier).min(rules.score_cap);
        let level = if score > rules.high_level_above {
            RiskLevel::High
        } else if score > rules.medium_level_above {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        if level == RiskLevel::Low && factors.is_empty() {
            factors.push("Safe Conditions".to_string());
        }

        Ok(PredictionResponse {
            risk_score: round2(score),
            risk_level: level,
            factors,
            live_data: LiveData {
                weather: live.weather,
                traffic: live.traffic,
                nearest_blackspot: spot_name,
                distance_km: round2(dist_km),
            },
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
