use anyhow::Result;
use clap::Parser;
use saferoute_cli::{init_tracing, Endpoint};
use saferoute_client::{NominatimClient, RiskApiClient, DEFAULT_NOMINATIM_URL};
use saferoute_core::models::{GeoPoint, PredictionResponse};
use saferoute_core::RiskPredictor;

/// Score the accident risk at a single location.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Place name (geocoded)
    #[arg(long)]
    place: Option<String>,

    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    lat: Option<f64>,

    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lon: Option<f64>,

    /// Risk API URL
    #[arg(long, default_value = "http://localhost:8000")]
    api_url: String,

    /// Score locally instead of asking the API
    #[arg(long)]
    offline: bool,

    /// Nominatim geocoder URL
    #[arg(long, default_value = DEFAULT_NOMINATIM_URL)]
    geocoder_url: String,

    /// City appended to place searches
    #[arg(long, default_value = "Bengaluru")]
    city: String,

    /// Print the raw JSON response
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("predict=info,saferoute_client=warn");
    let args = Args::parse();

    let point = args.lat.zip(args.lon).map(|(lat, lon)| GeoPoint::new(lat, lon));
    let endpoint = Endpoint::from_args(args.place.clone(), point, "place")?;
    let geocoder = NominatimClient::new(&args.geocoder_url, Some(args.city.clone()))?;
    let point = endpoint.resolve(&geocoder).await?;

    let prediction = if args.offline {
        RiskPredictor::default().predict(&point)?
    } else {
        RiskApiClient::new(&args.api_url)?.predict(point).await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        print_prediction(&point, &prediction);
    }
    Ok(())
}

fn print_prediction(point: &GeoPoint, prediction: &PredictionResponse) {
    println!("Location:   {}", point);
    println!(
        "Risk:       {:?} ({:.0}%)",
        prediction.risk_level,
        prediction.risk_score * 100.0
    );
    let live = &prediction.live_data;
    println!("Traffic:    {:?}", live.traffic);
    println!("Weather:    {:?}", live.weather);
    println!(
        "Blackspot:  {} ({:.2} km)",
        live.nearest_blackspot, live.distance_km
    );
    if prediction.factors.is_empty() {
        println!("Factors:    none");
    } else {
        println!("Factors:");
        for factor in &prediction.factors {
            println!("  - {}", factor);
        }
    }
}
