//! Road node labelling for the historical risk dataset.

use serde::{Deserialize, Serialize};

use crate::blackspots::nearest_blackspot;
use crate::models::GeoPoint;
use crate::rules::RiskRules;

/// A raw road graph node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadNode {
    pub lat: f64,
    pub lon: f64,
    /// Number of street approaches meeting at the node
    #[serde(default)]
    pub junction_complexity: u32,
}

/// A node with its proximity features and risk label (0 = low, 1 = high).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledNode {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub junction_complexity: u32,
    pub dist_to_blackspot_km: f64,
    pub nearest_blackspot_name: String,
    pub risk_label: u8,
}

impl LabeledNode {
    pub fn is_high_risk(&self) -> bool {
        self.risk_label == 1
    }
}

/// High risk if near a blackspot or at a complex junction.
pub fn risk_label(dist_to_blackspot_km: f64, junction_complexity: u32, rules: &RiskRules) -> u8 {
    if dist_to_blackspot_km <= rules.blackspot_radius_km
        || junction_complexity >= rules.complex_junction_degree
    {
        1
    } else {
        0
    }
}

pub fn label_node(node: &RoadNode, rules: &RiskRules) -> LabeledNode {
    let (name, dist_km) = match nearest_blackspot(&GeoPoint::new(node.lat, node.lon)) {
        Some(nearest) => (nearest.name, nearest.distance_km),
        None => ("None".to_string(), f64::MAX),
    };
    LabeledNode {
        lat: node.lat,
        lon: node.lon,
        junction_complexity: node.junction_complexity,
        dist_to_blackspot_km: dist_km,
        nearest_blackspot_name: name,
        risk_label: risk_label(dist_km, node.junction_complexity, rules),
    }
}

pub fn label_nodes(nodes: &[RoadNode], rules: &RiskRules) -> Vec<LabeledNode> {
    nodes.iter().map(|node| label_node(node, rules)).collect()
}

/// Heatmap points `[lat, lon, 1.0]` for every high-risk node.
pub fn high_risk_points(nodes: &[LabeledNode]) -> Vec<Vec<f64>> {
    nodes
        .iter()
        .filter(|node| node.is_high_risk())
        .map(|node| vec![node.lat, node.lon, 1.0])
        .collect()
}
