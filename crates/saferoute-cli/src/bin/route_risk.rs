use anyhow::{anyhow, Result};
use clap::Parser;
use saferoute_cli::{init_tracing, parse_lat_lng, ConsoleRenderer, Endpoint};
use saferoute_client::{
    NominatimClient, OsrmClient, RiskApiClient, DEFAULT_NOMINATIM_URL, DEFAULT_OSRM_URL,
};
use saferoute_core::models::GeoPoint;
use saferoute_core::segmentation::SegmentationConfig;
use saferoute_core::RiskRules;
use saferoute_overlay::{
    OverlayOutcome, RefreshOutcome, RiskZoneStore, RouteOverlayCoordinator,
};
use std::sync::Arc;
use std::time::Duration;

/// Route between two places and print the stretches that pass near known
/// accident blackspots.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Start place name (geocoded)
    #[arg(long)]
    from: Option<String>,

    /// Destination place name (geocoded)
    #[arg(long)]
    to: Option<String>,

    /// Start as "lat,lng"
    #[arg(long, value_parser = parse_lat_lng, allow_hyphen_values = true)]
    start: Option<GeoPoint>,

    /// Destination as "lat,lng"
    #[arg(long, value_parser = parse_lat_lng, allow_hyphen_values = true)]
    end: Option<GeoPoint>,

    /// Risk API URL
    #[arg(long, default_value = "http://localhost:8000")]
    api_url: String,

    /// OSRM routing engine URL
    #[arg(long, default_value = DEFAULT_OSRM_URL)]
    osrm_url: String,

    /// Nominatim geocoder URL
    #[arg(long, default_value = DEFAULT_NOMINATIM_URL)]
    geocoder_url: String,

    /// City appended to place searches
    #[arg(long, default_value = "Bengaluru")]
    city: String,

    /// Proximity threshold (degrees, or meters with --haversine)
    #[arg(long)]
    threshold: Option<f64>,

    /// Measure proximity in meters on the sphere instead of planar degrees
    #[arg(long, conflicts_with = "planar_meters")]
    haversine: bool,

    /// Planar threshold sized to reach this many meters at the start latitude
    #[arg(long, conflicts_with = "threshold")]
    planar_meters: Option<f64>,

    /// Give up if no result arrives within this many seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("route_risk=info,saferoute_overlay=warn,saferoute_client=warn");
    let args = Args::parse();

    let from = Endpoint::from_args(args.from.clone(), args.start, "from")?;
    let to = Endpoint::from_args(args.to.clone(), args.end, "to")?;

    let geocoder = NominatimClient::new(&args.geocoder_url, Some(args.city.clone()))?;
    let start = from.resolve(&geocoder).await?;
    let end = to.resolve(&geocoder).await?;
    println!("Route: {} -> {}", start, end);

    let config = segmentation_config(&args, &start);
    let store = Arc::new(RiskZoneStore::new(Arc::new(RiskApiClient::new(&args.api_url)?)));
    match store.refresh().await {
        RefreshOutcome::Applied { zones, .. } => println!("Loaded {} risk zone(s)", zones),
        RefreshOutcome::Failed(err) => println!("Risk data unavailable ({}); no zones", err),
        RefreshOutcome::Superseded => {}
    }

    let router = Arc::new(OsrmClient::new(&args.osrm_url, "driving")?);
    let mut coordinator =
        RouteOverlayCoordinator::new(store, router, ConsoleRenderer::new(), config);
    coordinator.request_route(start, end);

    let wait = Duration::from_secs(args.timeout_secs);
    let outcome = tokio::time::timeout(wait, coordinator.settle())
        .await
        .map_err(|_| anyhow!("No route after {}s", args.timeout_secs))?;

    match outcome {
        Some(OverlayOutcome::Rendered { segments, .. }) if segments == 0 => {
            println!("No danger segments along this route.");
        }
        Some(OverlayOutcome::Rendered { segments, .. }) => {
            let points: usize = coordinator
                .renderer()
                .map(|renderer| renderer.layer().iter().map(Vec::len).sum())
                .unwrap_or(0);
            println!("{} danger segment(s), {} point(s) at risk", segments, points);
        }
        Some(OverlayOutcome::NoRoute(err)) => return Err(anyhow!("No route: {}", err)),
        other => return Err(anyhow!("Overlay stopped unexpectedly: {:?}", other)),
    }

    coordinator.dispose();
    Ok(())
}

fn segmentation_config(args: &Args, start: &GeoPoint) -> SegmentationConfig {
    if let Some(meters) = args.planar_meters {
        return SegmentationConfig::planar_for_meters(meters, start.lat);
    }
    let rules = RiskRules::default();
    match (args.haversine, args.threshold) {
        (true, Some(threshold)) => SegmentationConfig::haversine(threshold),
        (true, None) => SegmentationConfig::haversine(rules.proximity_threshold_m),
        (false, Some(threshold)) => SegmentationConfig::planar(threshold),
        (false, None) => SegmentationConfig::planar(rules.proximity_threshold_deg),
    }
}
