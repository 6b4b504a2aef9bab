//! Route risk segmentation.
//!
//! Classifies every coordinate of a route by proximity to known risk zones
//! and groups consecutive risky coordinates into drawable danger segments.
//! Pure functions: no I/O, no state beyond the arguments.

use serde::{Deserialize, Serialize};

use crate::models::{ClassifiedPoint, DangerSegment, RiskZone, RouteCoordinate, RoutePath};
use crate::spatial::{meters_to_lat, meters_to_lon, DistanceMetric};

/// Proximity threshold and the distance function it is measured with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Same unit as `metric` (degrees for planar, meters for haversine)
    pub threshold: f64,
    pub metric: DistanceMetric,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        crate::rules::RiskRules::default().segmentation_config()
    }
}

impl SegmentationConfig {
    pub fn planar(threshold_deg: f64) -> Self {
        Self {
            threshold: threshold_deg,
            metric: DistanceMetric::Planar,
        }
    }

    pub fn haversine(threshold_m: f64) -> Self {
        Self {
            threshold: threshold_m,
            metric: DistanceMetric::Haversine,
        }
    }

    /// Planar threshold that reaches at least `threshold_m` in every
    /// direction around `ref_lat`. Longitude degrees are shorter, so they
    /// set the radius away from the equator.
    pub fn planar_for_meters(threshold_m: f64, ref_lat: f64) -> Self {
        let lat_deg = meters_to_lat(threshold_m, ref_lat);
        let lon_deg = meters_to_lon(threshold_m, ref_lat);
        Self::planar(lat_deg.max(lon_deg))
    }

    pub fn is_usable(&self) -> bool {
        self.threshold.is_finite() && self.threshold > 0.0
    }
}

/// Whether `coordinate` lies strictly closer than the threshold to any zone.
///
/// Stops at the first matching zone.
pub fn is_risky(
    coordinate: &RouteCoordinate,
    zones: &[RiskZone],
    config: &SegmentationConfig,
) -> bool {
    if !config.is_usable() {
        return false;
    }
    zones
        .iter()
        .any(|zone| config.metric.distance(&coordinate.point, &zone.point()) < config.threshold)
}

/// Classify each route coordinate, preserving path order.
pub fn classify(
    route: &RoutePath,
    zones: &[RiskZone],
    config: &SegmentationConfig,
) -> Vec<ClassifiedPoint> {
    route
        .coordinates()
        .iter()
        .map(|coordinate| ClassifiedPoint {
            coordinate: *coordinate,
            is_risky: is_risky(coordinate, zones, config),
        })
        .collect()
}

/// Group consecutive risky points into segments.
///
/// A run of a single risky point has nothing to draw and is dropped.
pub fn group_segments(classified: &[ClassifiedPoint]) -> Vec<DangerSegment> {
    let mut segments = Vec::new();
    let mut run: Vec<RouteCoordinate> = Vec::new();

    for point in classified {
        if point.is_risky {
            run.push(point.coordinate);
        } else {
            close_run(&mut run, &mut segments);
        }
    }
    close_run(&mut run, &mut segments);

    segments
}

fn close_run(run: &mut Vec<RouteCoordinate>, segments: &mut Vec<DangerSegment>) {
    if run.len() >= 2 {
        segments.push(DangerSegment::from_run(std::mem::take(run)));
    } else {
        run.clear();
    }
}

/// Partition a route into danger segments, in path order.
///
/// Runs in O(path length x zone count). A path shorter than two points or
/// an empty zone set yields no segments.
pub fn segmentize(
    route: &RoutePath,
    zones: &[RiskZone],
    config: &SegmentationConfig,
) -> Vec<DangerSegment> {
    if !route.is_drawable() || zones.is_empty() {
        return Vec::new();
    }
    group_segments(&classify(route, zones, config))
}
