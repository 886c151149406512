// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod scoring;
pub mod storage;
pub mod transport;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use crate::api::create_router as router;
pub use crate::config::AppConfig;
pub use crate::pipeline::{handle_message, run_ingestion, IngestStats};
pub use crate::storage::{aggregate, AggregationResult, TimeSeriesRow};

use crate::scoring::{HttpScoringEngine, ScoringEngine};
use crate::storage::{InfluxDataStore, ScoreSink};

/// A wired service: the HTTP router plus the running ingestion task.
pub struct Service {
    pub router: Router,
    pub ingestion: JoinHandle<IngestStats>,
}

/// Connect to the store (creating the database if needed), spawn the
/// ingestion loop and build the router.
pub async fn start(cfg: &AppConfig) -> anyhow::Result<Service> {
    let store = Arc::new(
        InfluxDataStore::connect(&cfg.influx)
            .await
            .with_context(|| format!("connecting to influx at {}", cfg.influx.url))?,
    );
    let engine: Arc<dyn ScoringEngine> = Arc::new(HttpScoringEngine::new(&cfg.scoring.url)?);
    info!(
        influx = %cfg.influx.url,
        database = %cfg.influx.database,
        scoring = %cfg.scoring.url,
        topic = %cfg.transport.topic,
        "service configured"
    );

    let (publisher, source) =
        transport::channel(cfg.transport.topic.clone(), cfg.transport.channel_capacity);

    let sink: Arc<dyn ScoreSink> = store.clone();
    let ingestion =
        tokio::spawn(async move { run_ingestion(source, engine.as_ref(), sink.as_ref()).await });

    let mut router = api::create_router(api::AppState { store, publisher });
    match crate::metrics::Metrics::install(cfg.transport.channel_capacity) {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => warn!(error = ?e, "metrics endpoint disabled"),
    }

    Ok(Service { router, ingestion })
}
