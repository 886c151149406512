//! Scores a feature vector and persists the score of anomalies.

use metrics::counter;

use crate::error::ScoringError;
use crate::scoring::ScoringEngine;
use crate::storage::ScoreSink;

use super::types::{AnomalyDecision, ScoredFeatureVector};

/// Ask `engine` about the features; on anomaly hand the score to `sink` once.
///
/// Takes the vector by value: a message cannot be dispatched twice.
/// Persistence failures are logged and swallowed, the decision is still
/// returned. Engine failures persist nothing.
pub async fn dispatch(
    scored: ScoredFeatureVector,
    engine: &dyn ScoringEngine,
    sink: &dyn ScoreSink,
) -> Result<AnomalyDecision, ScoringError> {
    let ScoredFeatureVector { score, features } = scored;

    let is_normal = engine
        .is_normal(&features)
        .await
        .map_err(ScoringError::EngineFailure)?;
    let decision = AnomalyDecision::from_engine(is_normal);

    if !decision.is_anomaly() {
        tracing::debug!(engine = engine.name(), "no anomaly detected");
        return Ok(decision);
    }

    tracing::debug!(engine = engine.name(), score, "anomaly detected, storing score");
    counter!("ingest_anomalies_total").increment(1);
    if let Err(e) = sink.save(score).await {
        tracing::error!(error = %e, score, "failed to persist anomaly score");
        counter!("ingest_persist_errors_total").increment(1);
    }

    Ok(decision)
}
