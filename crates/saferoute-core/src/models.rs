//! Core data models for route risk segmentation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance (degrees) used when comparing coordinates.
pub const COORD_EPSILON_DEG: f64 = 1e-9;

/// A coordinate in degrees.
///
/// Equality is numeric with a small tolerance, so two points that went
/// through different float round-trips still compare equal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Compare with an explicit tolerance in degrees.
    pub fn approx_eq(&self, other: &GeoPoint, tolerance_deg: f64) -> bool {
        (self.lat - other.lat).abs() <= tolerance_deg
            && (self.lng - other.lng).abs() <= tolerance_deg
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Within the WGS84 lat/lng domain.
    pub fn is_valid(&self) -> bool {
        self.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    pub fn to_lat_lng(self) -> [f64; 2] {
        [self.lat, self.lng]
    }
}

impl PartialEq for GeoPoint {
    fn eq(&self, other: &Self) -> bool {
        self.approx_eq(other, COORD_EPSILON_DEG)
    }
}

impl From<[f64; 2]> for GeoPoint {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// A historically risky location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskZone {
    pub lat: f64,
    pub lng: f64,
    /// Heatmap intensity, when the source provides one
    #[serde(default)]
    pub weight: Option<f64>,
}

impl RiskZone {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            weight: None,
        }
    }

    /// Parse a heatmap entry: `[lat, lng]` or `[lat, lng, weight]`.
    pub fn from_heatmap_point(raw: &[f64]) -> Option<Self> {
        let (lat, lng) = match raw {
            [lat, lng] | [lat, lng, _] => (*lat, *lng),
            _ => return None,
        };
        let zone = Self {
            lat,
            lng,
            weight: raw.get(2).copied(),
        };
        zone.point().is_finite().then_some(zone)
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

impl From<GeoPoint> for RiskZone {
    fn from(point: GeoPoint) -> Self {
        Self::new(point.lat, point.lng)
    }
}

/// A point of a route, tagged with its zero-based position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteCoordinate {
    pub index: usize,
    #[serde(flatten)]
    pub point: GeoPoint,
}

/// The ordered coordinate sequence of one route request.
///
/// Immutable once built; indices always run `0..len`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RoutePath {
    coordinates: Vec<RouteCoordinate>,
}

impl RoutePath {
    pub fn from_points(points: impl IntoIterator<Item = GeoPoint>) -> Self {
        let coordinates = points
            .into_iter()
            .enumerate()
            .map(|(index, point)| RouteCoordinate { index, point })
            .collect();
        Self { coordinates }
    }

    pub fn coordinates(&self) -> &[RouteCoordinate] {
        &self.coordinates
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// A path needs two points to draw anything.
    pub fn is_drawable(&self) -> bool {
        self.coordinates.len() >= 2
    }

    pub fn first(&self) -> Option<&RouteCoordinate> {
        self.coordinates.first()
    }

    pub fn last(&self) -> Option<&RouteCoordinate> {
        self.coordinates.last()
    }
}

impl FromIterator<GeoPoint> for RoutePath {
    fn from_iter<T: IntoIterator<Item = GeoPoint>>(iter: T) -> Self {
        Self::from_points(iter)
    }
}

/// A route coordinate with its proximity classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedPoint {
    pub coordinate: RouteCoordinate,
    pub is_risky: bool,
}

/// A contiguous run (length >= 2) of risky route coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DangerSegment {
    coordinates: Vec<RouteCoordinate>,
}

impl DangerSegment {
    /// Only the segmentation engine builds segments.
    pub(crate) fn from_run(coordinates: Vec<RouteCoordinate>) -> Self {
        debug_assert!(coordinates.len() >= 2);
        debug_assert!(coordinates.windows(2).all(|w| w[0].index < w[1].index));
        Self { coordinates }
    }

    pub fn coordinates(&self) -> &[RouteCoordinate] {
        &self.coordinates
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn start_index(&self) -> usize {
        self.coordinates.first().map(|c| c.index).unwrap_or(0)
    }

    pub fn end_index(&self) -> usize {
        self.coordinates.last().map(|c| c.index).unwrap_or(0)
    }

    pub fn points(&self) -> impl Iterator<Item = GeoPoint> + '_ {
        self.coordinates.iter().map(|c| c.point)
    }

    /// `[lat, lng]` pairs, the polyline shape map renderers expect.
    pub fn to_lat_lngs(&self) -> Vec<[f64; 2]> {
        self.points().map(GeoPoint::to_lat_lng).collect()
    }
}

/// Monotonic token identifying one version of an input.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    pub const ZERO: Generation = Generation(0);

    pub fn next(self) -> Self {
        Generation(self.0.saturating_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// The (route, risk data) inputs a result was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationPair {
    pub route: Generation,
    pub risk: Generation,
}

/// All danger segments for one route / risk-zone pairing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationResult {
    pub generations: GenerationPair,
    pub segments: Vec<DangerSegment>,
    pub computed_at: DateTime<Utc>,
}

impl SegmentationResult {
    pub fn new(generations: GenerationPair, segments: Vec<DangerSegment>) -> Self {
        Self {
            generations,
            segments,
            computed_at: Utc::now(),
        }
    }

    pub fn empty(generations: GenerationPair) -> Self {
        Self::new(generations, Vec::new())
    }

    pub fn is_stale(&self, current: GenerationPair) -> bool {
        self.generations != current
    }
}

/// `/heatmap` payload: `{"points": [[lat, lon, intensity], ...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeatmapResponse {
    pub points: Vec<Vec<f64>>,
}

impl HeatmapResponse {
    /// Malformed entries are skipped.
    pub fn risk_zones(&self) -> Vec<RiskZone> {
        self.points
            .iter()
            .filter_map(|raw| RiskZone::from_heatmap_point(raw))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficStatus {
    #[serde(rename = "Free Flow")]
    FreeFlow,
    Moderate,
    Congested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weather {
    Clear,
    Rain,
}

/// Contextual fields returned alongside a point prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveData {
    pub weather: Weather,
    pub traffic: TrafficStatus,
    pub nearest_blackspot: String,
    pub distance_km: f64,
}

/// `/predict` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// 0.0 to 1.0
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub factors: Vec<String>,
    pub live_data: LiveData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_point_equality_uses_tolerance() {
        let a = GeoPoint::new(12.9716, 77.5946);
        let b = GeoPoint::new(12.9716 + 1e-12, 77.5946 - 1e-12);
        assert_eq!(a, b);
        assert_ne!(a, GeoPoint::new(12.9717, 77.5946));
    }

    #[test]
    fn route_path_assigns_sequential_indices() {
        let path = RoutePath::from_points([
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.001),
            GeoPoint::new(0.0, 0.002),
        ]);
        let indices: Vec<usize> = path.coordinates().iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(path.is_drawable());
        assert!(!RoutePath::from_points([GeoPoint::new(1.0, 1.0)]).is_drawable());
    }

    #[test]
    fn heatmap_points_accept_optional_weight() {
        let heatmap: HeatmapResponse =
            serde_json::from_str(r#"{"points": [[12.9, 77.6, 1.0], [13.0, 77.5], [1.0]]}"#)
                .unwrap();
        let zones = heatmap.risk_zones();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].weight, Some(1.0));
        assert_eq!(zones[1].weight, None);
    }

    #[test]
    fn prediction_response_uses_original_wire_names() {
        let live = LiveData {
            weather: Weather::Clear,
            traffic: TrafficStatus::FreeFlow,
            nearest_blackspot: "Hebbal Flyover".to_string(),
            distance_km: 0.42,
        };
        let value = serde_json::to_value(&live).unwrap();
        assert_eq!(value["traffic"], "Free Flow");
        assert_eq!(value["weather"], "Clear");
    }

    #[test]
    fn result_staleness_compares_both_generations() {
        let pair = GenerationPair {
            route: Generation(2),
            risk: Generation(1),
        };
        let result = SegmentationResult::empty(pair);
        assert!(!result.is_stale(pair));
        assert!(result.is_stale(GenerationPair {
            route: Generation(3),
            risk: Generation(1),
        }));
        assert!(result.is_stale(GenerationPair {
            route: Generation(2),
            risk: Generation(2),
        }));
    }
}
