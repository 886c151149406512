// src/pipeline/types.rs
use serde::Serialize;

/// Payload as delivered by the transport, before any parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub topic: String,
    pub payload: String,
}

impl RawMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Decoded comma-delimited payload. Shape is not checked here.
pub type NumericVector = Vec<f64>;

/// Leading score/class field plus the feature sub-vector that follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFeatureVector {
    pub score: f64,
    pub features: Box<[f64]>,
}

/// Outcome of the scoring engine. The engine answers "is this normal?",
/// so `true` maps to `Normal` and `false` to `Anomaly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyDecision {
    Normal,
    Anomaly,
}

impl AnomalyDecision {
    pub fn from_engine(is_normal: bool) -> Self {
        if is_normal {
            AnomalyDecision::Normal
        } else {
            AnomalyDecision::Anomaly
        }
    }

    pub fn is_anomaly(self) -> bool {
        matches!(self, AnomalyDecision::Anomaly)
    }
}
