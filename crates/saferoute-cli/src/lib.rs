//! SafeRoute CLI - command line tools around the risk overlay.
//!
//! Binaries:
//! - route_risk: geocode two places, route between them, print danger segments
//! - predict: score a single location
//! - build_dataset: label raw road nodes for the risk API

pub mod console;
pub mod endpoint;

pub use console::ConsoleRenderer;
pub use endpoint::{parse_lat_lng, Endpoint};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log to stderr, `RUST_LOG` overriding `default_directive`.
pub fn init_tracing(default_directive: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
