//! SafeRoute Overlay - keeps a map's danger overlay in step with its route
//!
//! Owns the risk zone snapshot, the in-flight route request and the
//! coordinator that pairs them and drives a [`MapOverlayRenderer`].

pub mod backoff;
pub mod coordinator;
pub mod refresh_loop;
pub mod route_source;
pub mod source;
pub mod store;

pub use coordinator::{
    CoordinatorEvent, OverlayOutcome, OverlayState, RenderedOverlay, RouteOverlayCoordinator,
};
pub use refresh_loop::run_refresh_loop;
pub use route_source::{RouteEvent, RouteSource};
pub use source::{MapOverlayRenderer, RiskZoneSource, RouteProvider, StaticRiskZones};
pub use store::{RefreshOutcome, RiskSnapshot, RiskZoneStore};
