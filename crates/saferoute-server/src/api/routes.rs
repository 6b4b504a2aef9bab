//! REST API routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::api::ws;
use crate::state::AppState;
use saferoute_core::models::{GeoPoint, HeatmapResponse, PredictionResponse, RoutePath};
use saferoute_core::segmentation::{classify, group_segments, SegmentationConfig};
use saferoute_core::spatial::DistanceMetric;
use saferoute_core::RiskError;

type ApiError = (StatusCode, Json<serde_json::Value>);

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", get(predict))
        .route("/heatmap", get(heatmap))
        .route("/v1/routes/segment", post(segment_route))
        .route("/v1/overlay", get(ws::overlay_ws_handler))
}

async fn root(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "System Online",
        "city": state.config().city,
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.zones().snapshot();
    Json(json!({
        "status": "ok",
        "risk_zones": snapshot.zones.len(),
        "risk_generation": snapshot.generation.0,
        "risk_loaded": snapshot.attempted && snapshot.last_error.is_none(),
        "risk_error": snapshot.last_error.map(|err| err.to_string()),
        "overlay_sessions": state.overlay_sessions(),
        "cached_predictions": state.cached_predictions(),
    }))
}

#[derive(Debug, Deserialize)]
struct PredictQuery {
    lat: f64,
    lon: f64,
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PredictQuery>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let point = GeoPoint::new(query.lat, query.lon);
    state.predict(&point).map(Json).map_err(|err| match err {
        RiskError::InvalidCoordinate(_) => bad_request(&err.to_string(), Some("lat/lon")),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": other.to_string() })),
        ),
    })
}

/// Every high-risk location as `[lat, lon, intensity]`.
async fn heatmap(State(state): State<Arc<AppState>>) -> Json<HeatmapResponse> {
    let snapshot = state.zones().snapshot();
    let points = snapshot
        .zones
        .iter()
        .map(|zone| vec![zone.lat, zone.lng, zone.weight.unwrap_or(1.0)])
        .collect();
    Json(HeatmapResponse { points })
}

#[derive(Debug, Deserialize)]
struct SegmentRequest {
    /// `[lat, lng]` pairs in path order
    coordinates: Vec<[f64; 2]>,
    #[serde(default)]
    threshold: Option<f64>,
    #[serde(default)]
    metric: Option<DistanceMetric>,
}

#[derive(Debug, Serialize)]
struct SegmentResponse {
    /// Each segment as `[lat, lng]` pairs
    segments: Vec<Vec<[f64; 2]>>,
    risky_points: usize,
    total_points: usize,
    risk_generation: u64,
}

/// Segment an already computed route against the current risk zones.
async fn segment_route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SegmentRequest>,
) -> Result<Json<SegmentResponse>, ApiError> {
    let config = segmentation_config(&state, &request)?;

    let path: RoutePath = request.coordinates.iter().copied().map(GeoPoint::from).collect();
    if let Some(bad) = path.coordinates().iter().find(|c| !c.point.is_finite()) {
        return Err(bad_request(
            &format!("coordinate {} is not a finite number", bad.index),
            Some("coordinates"),
        ));
    }

    let snapshot = state.zones().snapshot();
    let classified = classify(&path, &snapshot.zones, &config);
    let risky_points = classified.iter().filter(|point| point.is_risky).count();
    let segments = if path.is_drawable() {
        group_segments(&classified)
    } else {
        Vec::new()
    };

    tracing::debug!(
        "Segmented {} point(s): {} risky, {} segment(s)",
        path.len(),
        risky_points,
        segments.len()
    );

    Ok(Json(SegmentResponse {
        segments: segments.iter().map(|segment| segment.to_lat_lngs()).collect(),
        risky_points,
        total_points: path.len(),
        risk_generation: snapshot.generation.0,
    }))
}

fn segmentation_config(
    state: &AppState,
    request: &SegmentRequest,
) -> Result<SegmentationConfig, ApiError> {
    let rules = state.predictor().rules();
    let metric = request.metric.unwrap_or(rules.metric);
    let threshold = request.threshold.unwrap_or(match metric {
        DistanceMetric::Planar => rules.proximity_threshold_deg,
        DistanceMetric::Haversine => rules.proximity_threshold_m,
    });
    let config = SegmentationConfig { threshold, metric };
    if !config.is_usable() {
        return Err(bad_request(
            &format!("threshold must be a positive number of {}", metric.unit()),
            Some("threshold"),
        ));
    }
    Ok(config)
}

fn bad_request(message: &str, field: Option<&str>) -> ApiError {
    let mut payload = json!({ "error": message });
    if let Some(field) = field {
        payload["field"] = serde_json::Value::String(field.to_string());
    }
    (StatusCode::BAD_REQUEST, Json(payload))
}
