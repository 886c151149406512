//! Feature-vector anomaly ingest service: binary entrypoint.
//! Loads config, connects the store, starts ingestion and serves the router.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vector_anomaly_ingest::AppConfig;

/// Compact logs filtered by `RUST_LOG`. The runtime may already have a
/// subscriber installed, in which case this is a no-op.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vector_anomaly_ingest=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;
    let service = vector_anomaly_ingest::start(&cfg).await?;

    Ok(service.router.into())
}
