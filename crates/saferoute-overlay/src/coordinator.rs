//! Danger overlay coordination.
//!
//! Pairs the latest route with the latest risk snapshot, runs segmentation
//! when both are available and keeps the renderer showing exactly one
//! consistent result. Every route result is checked against the newest
//! request generation; anything older is dropped unrendered.

use std::sync::Arc;

use saferoute_core::models::{
    DangerSegment, GeoPoint, Generation, GenerationPair, RoutePath, SegmentationResult,
};
use saferoute_core::segmentation::{segmentize, SegmentationConfig};
use saferoute_core::RiskError;
use tokio::sync::{mpsc, watch};

use crate::route_source::{RouteEvent, RouteSource};
use crate::source::{MapOverlayRenderer, RouteProvider};
use crate::store::{RiskSnapshot, RiskZoneStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    /// No route requested
    Idle,
    /// Route requested; waiting on the route and/or a first risk snapshot
    AwaitingInputs,
    /// Segments for the current generation pair are on the map
    Rendered,
    /// Last request found no route; overlay cleared
    NoRoute,
}

#[derive(Debug)]
pub enum CoordinatorEvent {
    RouteReady(RouteEvent),
    RiskZonesUpdated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayOutcome {
    Rendered {
        generations: GenerationPair,
        segments: usize,
    },
    Waiting,
    NoRoute(RiskError),
    /// Result for a superseded input, discarded
    Stale(RiskError),
    Cleared,
    /// Event had nothing to change
    Unchanged,
    Disposed,
}

impl OverlayOutcome {
    /// Whether the overlay reached a resting state for the current request.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            OverlayOutcome::Rendered { .. }
                | OverlayOutcome::NoRoute(_)
                | OverlayOutcome::Cleared
                | OverlayOutcome::Disposed
        )
    }
}

/// The segments currently on the map and the inputs they came from.
#[derive(Debug, Clone)]
pub struct RenderedOverlay {
    pub generations: GenerationPair,
    pub segments: Vec<DangerSegment>,
}

pub struct RouteOverlayCoordinator<R: MapOverlayRenderer> {
    store: Arc<RiskZoneStore>,
    risk_rx: watch::Receiver<RiskSnapshot>,
    routes: RouteSource,
    route_rx: mpsc::UnboundedReceiver<RouteEvent>,
    /// `None` once disposed
    renderer: Option<R>,
    config: SegmentationConfig,
    state: OverlayState,
    route: Option<(Generation, RoutePath)>,
    rendered: Option<RenderedOverlay>,
}

impl<R: MapOverlayRenderer> RouteOverlayCoordinator<R> {
    pub fn new(
        store: Arc<RiskZoneStore>,
        provider: Arc<dyn RouteProvider>,
        renderer: R,
        config: SegmentationConfig,
    ) -> Self {
        let risk_rx = store.subscribe();
        let (routes, route_rx) = RouteSource::new(provider);
        Self {
            store,
            risk_rx,
            routes,
            route_rx,
            renderer: Some(renderer),
            config,
            state: OverlayState::Idle,
            route: None,
            rendered: None,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn rendered(&self) -> Option<&RenderedOverlay> {
        self.rendered.as_ref()
    }

    pub fn latest_route_generation(&self) -> Generation {
        self.routes.latest()
    }

    pub fn is_disposed(&self) -> bool {
        self.renderer.is_none()
    }

    pub fn renderer(&self) -> Option<&R> {
        self.renderer.as_ref()
    }

    /// Ask for a new route. The previous overlay stays until the new
    /// result replaces it.
    pub fn request_route(&mut self, start: GeoPoint, end: GeoPoint) -> Option<Generation> {
        if self.is_disposed() {
            return None;
        }
        let generation = self.routes.request(start, end);
        self.route = None;
        self.state = OverlayState::AwaitingInputs;
        tracing::info!("Route {} requested: {} -> {}", generation, start, end);
        Some(generation)
    }

    /// Drop the route and remove every drawn segment.
    pub fn clear_route(&mut self) -> OverlayOutcome {
        let Some(renderer) = self.renderer.as_mut() else {
            return OverlayOutcome::Disposed;
        };
        self.routes.cancel();
        self.route = None;
        self.rendered = None;
        renderer.clear();
        self.state = OverlayState::Idle;
        tracing::info!("Route cleared");
        OverlayOutcome::Cleared
    }

    /// Wait for the next input signal.
    ///
    /// Returns `None` once disposed or when the store is gone.
    pub async fn next_event(&mut self) -> Option<CoordinatorEvent> {
        if self.is_disposed() {
            return None;
        }
        tokio::select! {
            Some(event) = self.route_rx.recv() => Some(CoordinatorEvent::RouteReady(event)),
            changed = self.risk_rx.changed() => match changed {
                Ok(()) => Some(CoordinatorEvent::RiskZonesUpdated),
                Err(_) => None,
            },
        }
    }

    pub fn handle(&mut self, event: CoordinatorEvent) -> OverlayOutcome {
        if self.is_disposed() {
            return OverlayOutcome::Disposed;
        }
        match event {
            CoordinatorEvent::RouteReady(event) => self.on_route(event),
            CoordinatorEvent::RiskZonesUpdated => self.on_risk_update(),
        }
    }

    /// Wait for one event and apply it.
    pub async fn step(&mut self) -> Option<OverlayOutcome> {
        let event = self.next_event().await?;
        Some(self.handle(event))
    }

    /// Process events until the current request settles.
    pub async fn settle(&mut self) -> Option<OverlayOutcome> {
        loop {
            let outcome = self.step().await?;
            if outcome.is_settled() {
                return Some(outcome);
            }
        }
    }

    /// Release the renderer and stop honoring pending results.
    pub fn dispose(&mut self) {
        self.routes.cancel();
        self.route_rx.close();
        self.route = None;
        self.rendered = None;
        self.state = OverlayState::Idle;
        if let Some(mut renderer) = self.renderer.take() {
            renderer.clear();
            tracing::debug!("Overlay coordinator disposed");
        }
    }

    fn on_route(&mut self, event: RouteEvent) -> OverlayOutcome {
        let expected = self.routes.latest();
        if event.generation != expected || self.state == OverlayState::Idle {
            tracing::debug!(
                "Dropping route result {} (latest {})",
                event.generation,
                expected
            );
            return OverlayOutcome::Stale(RiskError::StaleResult {
                expected,
                actual: event.generation,
            });
        }

        match event.outcome {
            Ok(path) => {
                tracing::debug!("Route {} ready with {} point(s)", event.generation, path.len());
                self.route = Some((event.generation, path));
                self.try_render()
            }
            Err(err) => {
                tracing::warn!("Route {} failed: {}", event.generation, err);
                self.route = None;
                self.rendered = None;
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.clear();
                }
                self.state = OverlayState::NoRoute;
                OverlayOutcome::NoRoute(err)
            }
        }
    }

    fn on_risk_update(&mut self) -> OverlayOutcome {
        // Mark the change as seen even if there is nothing to recompute.
        self.risk_rx.borrow_and_update();
        match self.state {
            OverlayState::Idle | OverlayState::NoRoute => OverlayOutcome::Unchanged,
            OverlayState::AwaitingInputs | OverlayState::Rendered => self.try_render(),
        }
    }

    fn try_render(&mut self) -> OverlayOutcome {
        let snapshot = self.risk_rx.borrow_and_update().clone();
        let Some((route_generation, path)) = self.route.as_ref() else {
            return OverlayOutcome::Waiting;
        };
        if !snapshot.attempted {
            self.state = OverlayState::AwaitingInputs;
            return OverlayOutcome::Waiting;
        }

        let generations = GenerationPair {
            route: *route_generation,
            risk: snapshot.generation,
        };
        if let Some(rendered) = &self.rendered {
            if rendered.generations == generations {
                return OverlayOutcome::Unchanged;
            }
        }

        let result = if path.is_drawable() {
            SegmentationResult::new(generations, segmentize(path, &snapshot.zones, &self.config))
        } else {
            SegmentationResult::empty(generations)
        };
        self.apply(result)
    }

    fn apply(&mut self, result: SegmentationResult) -> OverlayOutcome {
        let current = GenerationPair {
            route: self.routes.latest(),
            risk: self.store.snapshot().generation,
        };
        if result.is_stale(current) {
            tracing::debug!(
                "Discarding segmentation for {:?}, current is {:?}",
                result.generations,
                current
            );
            return OverlayOutcome::Stale(RiskError::StaleResult {
                expected: current.route,
                actual: result.generations.route,
            });
        }

        let Some(renderer) = self.renderer.as_mut() else {
            return OverlayOutcome::Disposed;
        };
        renderer.replace(&result.segments);

        let segments = result.segments.len();
        tracing::info!(
            "Rendered {} danger segment(s) for route {} / risk {}",
            segments,
            result.generations.route,
            result.generations.risk
        );
        self.rendered = Some(RenderedOverlay {
            generations: result.generations,
            segments: result.segments,
        });
        self.state = OverlayState::Rendered;
        OverlayOutcome::Rendered {
            generations: result.generations,
            segments,
        }
    }
}

impl<R: MapOverlayRenderer> Drop for RouteOverlayCoordinator<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RiskZoneSource;
    use crate::store::RefreshOutcome;
    use futures::future::BoxFuture;
    use saferoute_core::models::RiskZone;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Draw(Vec<Vec<usize>>),
        Clear,
    }

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl MapOverlayRenderer for Recorder {
        fn draw(&mut self, segments: &[DangerSegment]) {
            let runs = segments
                .iter()
                .map(|s| s.coordinates().iter().map(|c| c.index).collect())
                .collect();
            self.calls.lock().unwrap().push(Call::Draw(runs));
        }

        fn clear(&mut self) {
            self.calls.lock().unwrap().push(Call::Clear);
        }
    }

    type RouteReply = Result<Vec<GeoPoint>, RiskError>;

    /// Routes resolve when the test releases the matching gate.
    #[derive(Default)]
    struct GatedRoutes {
        gates: Mutex<VecDeque<oneshot::Receiver<RouteReply>>>,
    }

    impl GatedRoutes {
        fn gate(&self) -> oneshot::Sender<RouteReply> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().push_back(rx);
            tx
        }
    }

    impl RouteProvider for GatedRoutes {
        fn compute_route(&self, _start: GeoPoint, _end: GeoPoint) -> BoxFuture<'_, RouteReply> {
            let gate = self.gates.lock().unwrap().pop_front();
            Box::pin(async move {
                match gate {
                    Some(rx) => rx
                        .await
                        .unwrap_or_else(|_| Err(RiskError::RouteNotFound("gate dropped".into()))),
                    None => Err(RiskError::RouteNotFound("no gate".into())),
                }
            })
        }
    }

    struct Zones(Mutex<VecDeque<Result<Vec<RiskZone>, RiskError>>>);

    impl Zones {
        fn new(replies: Vec<Result<Vec<RiskZone>, RiskError>>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(replies.into())))
        }
    }

    impl RiskZoneSource for Zones {
        fn fetch_risk_zones(&self) -> BoxFuture<'_, Result<Vec<RiskZone>, RiskError>> {
            let reply = self
                .0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RiskError::RiskDataUnavailable("exhausted".into())));
            Box::pin(async move { reply })
        }
    }

    fn path_points() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.001),
            GeoPoint::new(0.0, 0.002),
            GeoPoint::new(0.0, 0.01),
            GeoPoint::new(0.0, 0.011),
        ]
    }

    const START: GeoPoint = GeoPoint::new(0.0, 0.0);
    const END: GeoPoint = GeoPoint::new(0.0, 0.011);

    fn setup(
        zones: Vec<Result<Vec<RiskZone>, RiskError>>,
    ) -> (
        RouteOverlayCoordinator<Recorder>,
        Arc<RiskZoneStore>,
        Arc<GatedRoutes>,
        Recorder,
    ) {
        let store = Arc::new(RiskZoneStore::new(Zones::new(zones)));
        let routes = Arc::new(GatedRoutes::default());
        let recorder = Recorder::default();
        let coordinator = RouteOverlayCoordinator::new(
            store.clone(),
            routes.clone(),
            recorder.clone(),
            SegmentationConfig::planar(0.0025),
        );
        (coordinator, store, routes, recorder)
    }

    async fn settle(coordinator: &mut RouteOverlayCoordinator<Recorder>) -> OverlayOutcome {
        tokio::time::timeout(Duration::from_secs(5), coordinator.settle())
            .await
            .expect("coordinator settled")
            .expect("event stream open")
    }

    #[tokio::test]
    async fn renders_once_route_and_risk_are_ready() {
        let (mut coordinator, store, routes, recorder) =
            setup(vec![Ok(vec![RiskZone::new(0.0, 0.0)])]);
        store.refresh().await;

        let gate = routes.gate();
        let generation = coordinator.request_route(START, END).unwrap();
        assert_eq!(coordinator.state(), OverlayState::AwaitingInputs);
        gate.send(Ok(path_points())).unwrap();

        let outcome = settle(&mut coordinator).await;
        assert_eq!(
            outcome,
            OverlayOutcome::Rendered {
                generations: GenerationPair {
                    route: generation,
                    risk: Generation(1)
                },
                segments: 1
            }
        );
        assert_eq!(coordinator.state(), OverlayState::Rendered);
        assert_eq!(recorder.calls(), vec![Call::Clear, Call::Draw(vec![vec![0, 1, 2]])]);
    }

    #[tokio::test]
    async fn waits_for_first_risk_attempt() {
        let (mut coordinator, store, routes, recorder) =
            setup(vec![Ok(vec![RiskZone::new(0.0, 0.0)])]);

        let gate = routes.gate();
        coordinator.request_route(START, END);
        gate.send(Ok(path_points())).unwrap();

        let outcome = coordinator.step().await.unwrap();
        assert_eq!(outcome, OverlayOutcome::Waiting);
        assert!(recorder.calls().is_empty());

        store.refresh().await;
        let outcome = settle(&mut coordinator).await;
        assert!(matches!(outcome, OverlayOutcome::Rendered { segments: 1, .. }));
    }

    #[tokio::test]
    async fn failed_risk_fetch_does_not_block_route() {
        let (mut coordinator, store, routes, recorder) =
            setup(vec![Err(RiskError::RiskDataUnavailable("offline".into()))]);
        store.refresh().await;

        let gate = routes.gate();
        coordinator.request_route(START, END);
        gate.send(Ok(path_points())).unwrap();

        let outcome = settle(&mut coordinator).await;
        assert!(matches!(outcome, OverlayOutcome::Rendered { segments: 0, .. }));
        assert_eq!(recorder.calls(), vec![Call::Clear, Call::Draw(vec![])]);
    }

    #[tokio::test]
    async fn late_result_for_old_generation_is_dropped() {
        let (mut coordinator, store, routes, recorder) =
            setup(vec![Ok(vec![RiskZone::new(0.0, 0.0)])]);
        store.refresh().await;

        let first_gate = routes.gate();
        let second_gate = routes.gate();
        let first = coordinator.request_route(START, END).unwrap();
        let second = coordinator.request_route(START, END).unwrap();

        // the first task is aborted before it polls, so open both gates
        let _ = first_gate.send(Ok(path_points()));
        let _ = second_gate.send(Ok(path_points()));

        let outcome = settle(&mut coordinator).await;
        match outcome {
            OverlayOutcome::Rendered { generations, .. } => {
                assert_eq!(generations.route, second)
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        // a result for the first generation arriving now is discarded
        let late = coordinator.handle(CoordinatorEvent::RouteReady(RouteEvent {
            generation: first,
            start: START,
            end: END,
            outcome: Ok(RoutePath::from_points(vec![START, END])),
        }));
        assert_eq!(
            late,
            OverlayOutcome::Stale(RiskError::StaleResult {
                expected: second,
                actual: first
            })
        );
        assert_eq!(recorder.calls().len(), 2);
        assert_eq!(coordinator.rendered().unwrap().generations.route, second);
    }

    #[tokio::test]
    async fn route_not_found_clears_previous_overlay() {
        let (mut coordinator, store, routes, recorder) =
            setup(vec![Ok(vec![RiskZone::new(0.0, 0.0)])]);
        store.refresh().await;

        let gate = routes.gate();
        coordinator.request_route(START, END);
        gate.send(Ok(path_points())).unwrap();
        settle(&mut coordinator).await;

        let gate = routes.gate();
        coordinator.request_route(START, GeoPoint::new(5.0, 5.0));
        gate.send(Err(RiskError::RouteNotFound("NoRoute".into()))).unwrap();

        let outcome = settle(&mut coordinator).await;
        assert!(matches!(outcome, OverlayOutcome::NoRoute(RiskError::RouteNotFound(_))));
        assert_eq!(coordinator.state(), OverlayState::NoRoute);
        assert!(coordinator.rendered().is_none());
        assert_eq!(recorder.calls().last(), Some(&Call::Clear));
    }

    #[tokio::test]
    async fn risk_refresh_rerenders_current_route() {
        let (mut coordinator, store, routes, recorder) = setup(vec![
            Ok(vec![RiskZone::new(0.0, 0.0)]),
            Ok(vec![RiskZone::new(0.0, 0.0105)]),
        ]);
        store.refresh().await;

        let gate = routes.gate();
        coordinator.request_route(START, END);
        gate.send(Ok(path_points())).unwrap();
        settle(&mut coordinator).await;

        store.refresh().await;
        let outcome = settle(&mut coordinator).await;
        match outcome {
            OverlayOutcome::Rendered { generations, segments } => {
                assert_eq!(generations.risk, Generation(2));
                assert_eq!(segments, 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        // every draw is preceded by a clear of the previous frame
        assert_eq!(
            recorder.calls(),
            vec![
                Call::Clear,
                Call::Draw(vec![vec![0, 1, 2]]),
                Call::Clear,
                Call::Draw(vec![vec![3, 4]]),
            ]
        );
    }

    #[tokio::test]
    async fn failed_refresh_keeps_rendered_overlay() {
        let (mut coordinator, store, routes, recorder) = setup(vec![
            Ok(vec![RiskZone::new(0.0, 0.0)]),
            Err(RiskError::RiskDataUnavailable("timeout".into())),
        ]);
        store.refresh().await;

        let gate = routes.gate();
        coordinator.request_route(START, END);
        gate.send(Ok(path_points())).unwrap();
        settle(&mut coordinator).await;
        let drawn = recorder.calls();
        let rendered = coordinator.rendered().map(|r| r.generations);

        assert!(matches!(store.refresh().await, RefreshOutcome::Failed(_)));
        let outcome = coordinator.step().await.unwrap();
        assert_eq!(outcome, OverlayOutcome::Unchanged);
        assert_eq!(coordinator.state(), OverlayState::Rendered);
        assert_eq!(coordinator.rendered().map(|r| r.generations), rendered);
        assert_eq!(recorder.calls(), drawn);
    }

    #[tokio::test]
    async fn new_route_waits_while_refresh_is_pending() {
        let (mut coordinator, store, routes, _recorder) = setup(vec![
            Ok(vec![RiskZone::new(0.0, 0.0)]),
            Ok(vec![RiskZone::new(0.0, 0.0105)]),
        ]);
        store.refresh().await;

        let gate = routes.gate();
        coordinator.request_route(START, END);
        gate.send(Ok(path_points())).unwrap();
        settle(&mut coordinator).await;

        // a new request arrives, then risk data moves on before the route lands
        let gate = routes.gate();
        let generation = coordinator.request_route(START, END).unwrap();
        store.refresh().await;
        let outcome = coordinator.step().await.unwrap();
        assert_eq!(outcome, OverlayOutcome::Waiting);

        gate.send(Ok(path_points())).unwrap();
        let outcome = settle(&mut coordinator).await;
        assert_eq!(
            outcome,
            OverlayOutcome::Rendered {
                generations: GenerationPair {
                    route: generation,
                    risk: Generation(2)
                },
                segments: 1
            }
        );
    }

    #[tokio::test]
    async fn single_point_route_renders_nothing() {
        let (mut coordinator, store, routes, recorder) =
            setup(vec![Ok(vec![RiskZone::new(0.0, 0.0)])]);
        store.refresh().await;

        let gate = routes.gate();
        coordinator.request_route(START, START);
        gate.send(Ok(vec![START])).unwrap();

        let outcome = settle(&mut coordinator).await;
        assert!(matches!(outcome, OverlayOutcome::Rendered { segments: 0, .. }));
        assert_eq!(recorder.calls(), vec![Call::Clear, Call::Draw(vec![])]);
    }

    #[tokio::test]
    async fn clear_route_goes_idle_with_one_clear() {
        let (mut coordinator, store, routes, recorder) =
            setup(vec![Ok(vec![RiskZone::new(0.0, 0.0)])]);
        store.refresh().await;

        let gate = routes.gate();
        coordinator.request_route(START, END);
        gate.send(Ok(path_points())).unwrap();
        settle(&mut coordinator).await;
        let before = recorder.calls().len();

        assert_eq!(coordinator.clear_route(), OverlayOutcome::Cleared);
        assert_eq!(coordinator.state(), OverlayState::Idle);
        assert!(coordinator.rendered().is_none());
        let calls = recorder.calls();
        assert_eq!(calls.len(), before + 1);
        assert_eq!(calls.last(), Some(&Call::Clear));

        // risk updates while idle draw nothing
        assert_eq!(
            coordinator.handle(CoordinatorEvent::RiskZonesUpdated),
            OverlayOutcome::Unchanged
        );
        assert_eq!(recorder.calls().len(), before + 1);
    }

    #[tokio::test]
    async fn disposed_coordinator_ignores_pending_results() {
        let (mut coordinator, store, routes, recorder) =
            setup(vec![Ok(vec![RiskZone::new(0.0, 0.0)])]);
        store.refresh().await;

        let gate = routes.gate();
        let generation = coordinator.request_route(START, END).unwrap();
        coordinator.dispose();
        let _ = gate.send(Ok(path_points()));

        assert!(coordinator.is_disposed());
        assert!(coordinator.step().await.is_none());
        let outcome = coordinator.handle(CoordinatorEvent::RouteReady(RouteEvent {
            generation,
            start: START,
            end: END,
            outcome: Ok(RoutePath::from_points(path_points())),
        }));
        assert_eq!(outcome, OverlayOutcome::Disposed);
        assert!(coordinator.request_route(START, END).is_none());
        assert_eq!(recorder.calls(), vec![Call::Clear]);
    }

    #[tokio::test]
    async fn dropping_the_coordinator_clears_the_map() {
        let (coordinator, _store, _routes, recorder) = setup(vec![]);
        drop(coordinator);
        assert_eq!(recorder.calls(), vec![Call::Clear]);
    }
}
