//! One in-flight route computation at a time.

use std::sync::Arc;

use saferoute_core::models::{GeoPoint, Generation, RoutePath};
use saferoute_core::spatial::is_degenerate_pair;
use saferoute_core::RiskError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::source::RouteProvider;

/// Result of one route request, tagged with the generation it answers.
#[derive(Debug, Clone)]
pub struct RouteEvent {
    pub generation: Generation,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub outcome: Result<RoutePath, RiskError>,
}

pub struct RouteSource {
    provider: Arc<dyn RouteProvider>,
    latest: Generation,
    in_flight: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<RouteEvent>,
}

impl RouteSource {
    /// Events for every request arrive on the returned receiver.
    pub fn new(provider: Arc<dyn RouteProvider>) -> (Self, mpsc::UnboundedReceiver<RouteEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            provider,
            latest: Generation::ZERO,
            in_flight: None,
            tx,
        };
        (source, rx)
    }

    /// Generation of the most recent request (or cancellation).
    pub fn latest(&self) -> Generation {
        self.latest
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.latest
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Start computing a route, abandoning any earlier request.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request(&mut self, start: GeoPoint, end: GeoPoint) -> Generation {
        self.abort_in_flight();
        self.latest = self.latest.next();
        let generation = self.latest;

        if is_degenerate_pair(&start, &end) {
            tracing::debug!("Route {} requested with identical endpoints {}", generation, start);
        }

        let provider = self.provider.clone();
        let tx = self.tx.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let outcome = match provider.compute_route(start, end).await {
                Ok(points) if points.is_empty() => Err(RiskError::RouteNotFound(
                    "routing engine returned no coordinates".to_string(),
                )),
                Ok(points) => Ok(RoutePath::from_points(points)),
                Err(err) => Err(err),
            };
            // Receiver is gone once the coordinator is disposed
            let _ = tx.send(RouteEvent {
                generation,
                start,
                end,
                outcome,
            });
        }));

        generation
    }

    /// Drop interest in the current request. Any result already queued
    /// carries an old generation afterwards.
    pub fn cancel(&mut self) {
        self.abort_in_flight();
        self.latest = self.latest.next();
    }

    fn abort_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            if !handle.is_finished() {
                tracing::debug!("Abandoning in-flight route request {}", self.latest);
            }
            handle.abort();
        }
    }
}

impl Drop for RouteSource {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::time::Duration;

    struct StraightLine;

    impl RouteProvider for StraightLine {
        fn compute_route(
            &self,
            start: GeoPoint,
            end: GeoPoint,
        ) -> BoxFuture<'_, Result<Vec<GeoPoint>, RiskError>> {
            Box::pin(async move {
                // first request is slow so a second one can overtake it
                if start.lat == 0.0 {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok(vec![start, end])
            })
        }
    }

    struct Nothing;

    impl RouteProvider for Nothing {
        fn compute_route(
            &self,
            _start: GeoPoint,
            _end: GeoPoint,
        ) -> BoxFuture<'_, Result<Vec<GeoPoint>, RiskError>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_request_never_delivers() {
        let (mut source, mut rx) = RouteSource::new(Arc::new(StraightLine));

        let first = source.request(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0));
        let second = source.request(GeoPoint::new(1.0, 0.0), GeoPoint::new(1.0, 1.0));
        assert_eq!(first, Generation(1));
        assert_eq!(second, Generation(2));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.generation, second);
        assert_eq!(event.outcome.unwrap().len(), 2);

        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_route_is_not_found() {
        let (mut source, mut rx) = RouteSource::new(Arc::new(Nothing));
        source.request(GeoPoint::new(1.0, 1.0), GeoPoint::new(2.0, 2.0));
        let event = rx.recv().await.unwrap();
        assert!(matches!(event.outcome, Err(RiskError::RouteNotFound(_))));
    }

    #[tokio::test]
    async fn cancel_invalidates_generation() {
        let (mut source, _rx) = RouteSource::new(Arc::new(Nothing));
        let generation = source.request(GeoPoint::new(1.0, 1.0), GeoPoint::new(2.0, 2.0));
        assert!(source.is_current(generation));
        source.cancel();
        assert!(!source.is_current(generation));
    }
}
