//! Error kinds shared by the risk overlay components.

use crate::models::Generation;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    /// Risk-zone fetch failed; callers fall back to the last good snapshot.
    #[error("risk data unavailable: {0}")]
    RiskDataUnavailable(String),

    /// No drivable path between the endpoints.
    #[error("route not found: {0}")]
    RouteNotFound(String),

    /// A result computed from an input that has since been replaced.
    #[error("stale result: expected {expected}, got {actual}")]
    StaleResult {
        expected: Generation,
        actual: Generation,
    },

    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),
}

impl RiskError {
    pub fn is_stale(&self) -> bool {
        matches!(self, RiskError::StaleResult { .. })
    }
}
