//! Risk thresholds and scoring rules.

use serde::{Deserialize, Serialize};

use crate::segmentation::SegmentationConfig;
use crate::spatial::DistanceMetric;

/// Configuration for risk rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRules {
    /// Distance function for route proximity checks
    pub metric: DistanceMetric,
    /// Route proximity threshold for the planar metric (degrees)
    pub proximity_threshold_deg: f64,
    /// Route proximity threshold for the haversine metric (meters)
    pub proximity_threshold_m: f64,
    /// Score above which a point is High risk
    pub high_level_above: f64,
    /// Score above which a point is Medium risk
    pub medium_level_above: f64,
    /// Upper bound for a combined score
    pub score_cap: f64,
    /// Base probability above which blackspot proximity is listed as a factor
    pub proximity_factor_above: f64,
    pub congested_penalty: f64,
    pub moderate_penalty: f64,
    pub rain_penalty: f64,
    /// Nodes within this distance of a blackspot are labelled high risk
    pub blackspot_radius_km: f64,
    /// Junctions with at least this many approaches are labelled high risk
    pub complex_junction_degree: u32,
}

impl Default for RiskRules {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Planar,
            proximity_threshold_deg: 0.003, // ~300m near 13°N
            proximity_threshold_m: 300.0,
            high_level_above: 0.65,
            medium_level_above: 0.30,
            score_cap: 0.99,
            proximity_factor_above: 0.4,
            congested_penalty: 0.35,
            moderate_penalty: 0.10,
            rain_penalty: 0.20,
            blackspot_radius_km: 0.5,
            complex_junction_degree: 5,
        }
    }
}

impl RiskRules {
    /// Proximity threshold in the unit of the configured metric.
    pub fn proximity_threshold(&self) -> f64 {
        match self.metric {
            DistanceMetric::Planar => self.proximity_threshold_deg,
            DistanceMetric::Haversine => self.proximity_threshold_m,
        }
    }

    pub fn segmentation_config(&self) -> SegmentationConfig {
        SegmentationConfig {
            threshold: self.proximity_threshold(),
            metric: self.metric,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_follows_metric() {
        let mut rules = RiskRules::default();
        assert_eq!(rules.segmentation_config().threshold, 0.003);

        rules.metric = DistanceMetric::Haversine;
        let config = rules.segmentation_config();
        assert_eq!(config.threshold, 300.0);
        assert_eq!(config.metric, DistanceMetric::Haversine);
    }
}
