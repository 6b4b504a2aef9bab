use anyhow::{Context, Result};
use clap::Parser;
use saferoute_cli::init_tracing;
use saferoute_core::dataset::{label_nodes, RoadNode};
use saferoute_core::RiskRules;
use std::path::PathBuf;

/// Label raw road nodes by blackspot proximity and junction complexity.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON array of road nodes: {"lat", "lon", "junction_complexity"}
    #[arg(long)]
    input: PathBuf,

    /// Where to write the labelled dataset
    #[arg(long, default_value = "data/processed/training_data.json")]
    output: PathBuf,

    /// Override the labelling radius around blackspots (km)
    #[arg(long)]
    radius_km: Option<f64>,
}

fn main() -> Result<()> {
    init_tracing("build_dataset=info");
    let args = Args::parse();

    let mut rules = RiskRules::default();
    if let Some(radius) = args.radius_km {
        rules.blackspot_radius_km = radius;
    }

    let raw = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let nodes: Vec<RoadNode> = serde_json::from_slice(&raw)
        .with_context(|| format!("Failed to parse {}", args.input.display()))?;
    tracing::info!("Loaded {} road node(s)", nodes.len());

    let labeled = label_nodes(&nodes, &rules);
    let high_risk = labeled.iter().filter(|node| node.is_high_risk()).count();

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let encoded = serde_json::to_vec_pretty(&labeled).context("Failed to encode dataset")?;
    std::fs::write(&args.output, encoded)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!(
        "Labelled {} node(s): {} high risk, {} low risk -> {}",
        labeled.len(),
        high_risk,
        labeled.len() - high_risk,
        args.output.display()
    );
    Ok(())
}
