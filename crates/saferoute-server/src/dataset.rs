//! Labelled dataset on disk as a risk zone source.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use saferoute_core::dataset::{high_risk_points, LabeledNode};
use saferoute_core::models::RiskZone;
use saferoute_core::RiskError;
use saferoute_overlay::RiskZoneSource;

/// Read a JSON array of labelled nodes.
pub async fn load_labeled_nodes(path: &Path) -> Result<Vec<LabeledNode>> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("Failed to parse dataset {}", path.display()))
}

/// Every high-risk node becomes a full-weight zone.
pub fn high_risk_zones(nodes: &[LabeledNode]) -> Vec<RiskZone> {
    high_risk_points(nodes)
        .iter()
        .filter_map(|point| RiskZone::from_heatmap_point(point))
        .collect()
}

/// Re-reads the dataset file on every fetch.
#[derive(Debug, Clone)]
pub struct DatasetZones {
    path: PathBuf,
}

impl DatasetZones {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RiskZoneSource for DatasetZones {
    fn fetch_risk_zones(&self) -> BoxFuture<'_, Result<Vec<RiskZone>, RiskError>> {
        Box::pin(async move {
            let nodes = load_labeled_nodes(&self.path)
                .await
                .map_err(|err| RiskError::RiskDataUnavailable(format!("{:#}", err)))?;
            let zones = high_risk_zones(&nodes);
            tracing::debug!(
                "Loaded {} high-risk node(s) of {} from {}",
                zones.len(),
                nodes.len(),
                self.path.display()
            );
            Ok(zones)
        })
    }
}
