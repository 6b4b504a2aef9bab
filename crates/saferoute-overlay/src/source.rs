//! Seams to the external collaborators.

use futures::future::BoxFuture;
use saferoute_core::models::{DangerSegment, GeoPoint, RiskZone};
use saferoute_core::RiskError;

/// Bulk snapshot source of known risk locations.
pub trait RiskZoneSource: Send + Sync {
    fn fetch_risk_zones(&self) -> BoxFuture<'_, Result<Vec<RiskZone>, RiskError>>;
}

/// External routing engine.
///
/// Returns the ordered coordinates of a drivable path, or
/// `RiskError::RouteNotFound`.
pub trait RouteProvider: Send + Sync {
    fn compute_route(
        &self,
        start: GeoPoint,
        end: GeoPoint,
    ) -> BoxFuture<'_, Result<Vec<GeoPoint>, RiskError>>;
}

/// Map surface that displays danger segments.
///
/// Both calls must be idempotent and accept an empty list.
pub trait MapOverlayRenderer {
    fn draw(&mut self, segments: &[DangerSegment]);

    fn clear(&mut self);

    /// Swap the displayed segments for `segments`.
    ///
    /// Override when the surface can swap in a single frame.
    fn replace(&mut self, segments: &[DangerSegment]) {
        self.clear();
        self.draw(segments);
    }
}

impl<R: MapOverlayRenderer + ?Sized> MapOverlayRenderer for Box<R> {
    fn draw(&mut self, segments: &[DangerSegment]) {
        (**self).draw(segments)
    }

    fn clear(&mut self) {
        (**self).clear()
    }

    fn replace(&mut self, segments: &[DangerSegment]) {
        (**self).replace(segments)
    }
}

/// Fixed set of zones, e.g. loaded from disk at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticRiskZones {
    zones: Vec<RiskZone>,
}

impl StaticRiskZones {
    pub fn new(zones: Vec<RiskZone>) -> Self {
        Self { zones }
    }
}

impl RiskZoneSource for StaticRiskZones {
    fn fetch_risk_zones(&self) -> BoxFuture<'_, Result<Vec<RiskZone>, RiskError>> {
        let zones = self.zones.clone();
        Box::pin(async move { Ok(zones) })
    }
}
