pub mod blackspots;
pub mod dataset;
pub mod error;
pub mod models;
pub mod predictor;
pub mod rules;
pub mod segmentation;
pub mod spatial;

pub use blackspots::{nearest_blackspot, NearestBlackspot, BLACKSPOTS, CITY_CENTER};
pub use dataset::{high_risk_points, label_nodes, LabeledNode, RoadNode};
pub use error::RiskError;
pub use models::{
    ClassifiedPoint, DangerSegment, GeoPoint, Generation, GenerationPair, HeatmapResponse,
    LiveData, PredictionResponse, RiskLevel, RiskZone, RouteCoordinate, RoutePath,
    SegmentationResult, TrafficStatus, Weather,
};
pub use predictor::{
    BaseRiskModel, FixedLiveContext, LiveContext, LiveContextProvider, LogisticDistanceModel,
    RiskPredictor, SimulatedLiveContext,
};
pub use rules::RiskRules;
pub use segmentation::{classify, group_segments, segmentize, SegmentationConfig};
pub use spatial::{haversine_distance, planar_distance, DistanceMetric};
