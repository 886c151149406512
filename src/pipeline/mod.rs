// src/pipeline/mod.rs
pub mod dispatch;
pub mod parser;
pub mod splitter;
pub mod types;

use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

use crate::error::MessageError;
use crate::scoring::ScoringEngine;
use crate::storage::ScoreSink;
use crate::transport::MessageSource;
use types::{AnomalyDecision, RawMessage};

pub use dispatch::dispatch;
pub use parser::parse;
pub use splitter::split;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_messages_total", "Messages received from the transport.");
        describe_counter!(
            "ingest_dropped_total",
            "Messages dropped before persistence, by reason."
        );
        describe_counter!("ingest_anomalies_total", "Messages scored as anomalies.");
        describe_counter!(
            "ingest_persist_errors_total",
            "Anomaly scores lost to store write failures."
        );
        describe_histogram!("chart_query_ms", "Chart read query time in milliseconds.");
    });
}

/// Counts from one run of [`run_ingestion`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,
    pub normal: u64,
    pub anomalies: u64,
    pub dropped: u64,
}

/// Parse, split and dispatch a single message.
pub async fn handle_message(
    msg: &RawMessage,
    engine: &dyn ScoringEngine,
    sink: &dyn ScoreSink,
) -> Result<AnomalyDecision, MessageError> {
    tracing::debug!(topic = %msg.topic, payload = %msg.payload, "message");

    let vector = parse(&msg.payload)?;
    let scored = split(vector)?;
    Ok(dispatch(scored, engine, sink).await?)
}

/// Drain `source` until it closes. Messages are handled strictly one after
/// another, so persistence follows arrival order. A bad message is logged
/// and dropped; it never ends the loop.
pub async fn run_ingestion<S>(
    mut source: S,
    engine: &dyn ScoringEngine,
    sink: &dyn ScoreSink,
) -> IngestStats
where
    S: MessageSource,
{
    ensure_metrics_described();
    tracing::info!(topic = source.topic(), engine = engine.name(), "ingestion started");

    let mut stats = IngestStats::default();
    while let Some(msg) = source.next_message().await {
        stats.received += 1;
        counter!("ingest_messages_total").increment(1);

        match handle_message(&msg, engine, sink).await {
            Ok(AnomalyDecision::Normal) => stats.normal += 1,
            Ok(AnomalyDecision::Anomaly) => stats.anomalies += 1,
            Err(e) => {
                stats.dropped += 1;
                counter!("ingest_dropped_total", "reason" => e.reason()).increment(1);
                tracing::warn!(error = %e, topic = %msg.topic, "dropping message");
            }
        }
    }

    tracing::warn!(
        topic = source.topic(),
        received = stats.received,
        anomalies = stats.anomalies,
        dropped = stats.dropped,
        "message source closed, ingestion stopped"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PersistenceError, ShapeError};
    use crate::scoring::FnScoringEngine;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct VecSink(Mutex<Vec<f64>>);

    #[async_trait::async_trait]
    impl ScoreSink for VecSink {
        async fn save(&self, score: f64) -> Result<(), PersistenceError> {
            self.0.lock().unwrap().push(score);
            Ok(())
        }
    }

    #[tokio::test]
    async fn end_to_end_example_payload() {
        let engine = FnScoringEngine::new(|f: &[f64]| {
            assert_eq!(f, &[1.2, 3.4, 5.6]);
            Ok(false)
        });
        let sink = VecSink::default();
        let msg = RawMessage::new("t", "0.0,1.2,3.4,5.6");

        let d = handle_message(&msg, &engine, &sink).await.unwrap();
        assert_eq!(d, AnomalyDecision::Anomaly);
        assert_eq!(*sink.0.lock().unwrap(), vec![0.0]);
    }

    #[tokio::test]
    async fn short_or_bad_payloads_never_reach_engine() {
        let calls = AtomicUsize::new(0);
        let engine = FnScoringEngine::new(|_: &[f64]| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        });
        let sink = VecSink::default();

        for payload in ["", "1.0", "1.0,x", "a,b,c", "1,,2"] {
            let err = handle_message(&RawMessage::new("t", payload), &engine, &sink)
                .await
                .unwrap_err();
            assert!(matches!(err, MessageError::Parse(_) | MessageError::Shape(_)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn single_field_is_shape_error() {
        let engine = FnScoringEngine::new(|_: &[f64]| Ok(true));
        let sink = VecSink::default();
        let err = handle_message(&RawMessage::new("t", "4.0"), &engine, &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, MessageError::Shape(ShapeError::TooShort { len: 1 })));
    }
}
