//! Overlay seams backed by the HTTP clients.

use futures::future::BoxFuture;
use saferoute_core::models::{GeoPoint, RiskZone};
use saferoute_core::RiskError;
use saferoute_overlay::{RiskZoneSource, RouteProvider};

use crate::client::RiskApiClient;
use crate::osrm::OsrmClient;

impl RiskZoneSource for RiskApiClient {
    fn fetch_risk_zones(&self) -> BoxFuture<'_, Result<Vec<RiskZone>, RiskError>> {
        Box::pin(async move {
            self.fetch_heatmap()
                .await
                .map_err(|err| RiskError::RiskDataUnavailable(format!("{:#}", err)))
        })
    }
}

impl RouteProvider for OsrmClient {
    fn compute_route(
        &self,
        start: GeoPoint,
        end: GeoPoint,
    ) -> BoxFuture<'_, Result<Vec<GeoPoint>, RiskError>> {
        Box::pin(async move {
            match self.route(start, end).await {
                Ok(Some(route)) => Ok(route.points),
                Ok(None) => Err(RiskError::RouteNotFound(format!(
                    "no drivable path from {} to {}",
                    start, end
                ))),
                Err(err) => Err(RiskError::RouteNotFound(format!("{:#}", err))),
            }
        })
    }
}
