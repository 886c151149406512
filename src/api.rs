use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::error::QueryError;
use crate::storage::{AggregationResult, DataStore};
use crate::transport::ChannelPublisher;

/// Path the chart front end polls.
pub const CHART_PATH: &str = "/rest/space-shuttle/chart";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataStore>,
    pub publisher: ChannelPublisher,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(CHART_PATH, get(chart))
        .route("/ingest", post(ingest))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuery {
    since: Option<String>,
    #[serde(rename = "groupBy")]
    group_by: Option<String>,
}

struct ApiError(QueryError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            QueryError::InvalidDuration(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

async fn chart(
    State(state): State<AppState>,
    Query(q): Query<ChartQuery>,
) -> Result<Json<AggregationResult>, ApiError> {
    // empty query values mean "use the default", like an omitted parameter
    let since = q.since.as_deref().filter(|s| !s.is_empty());
    let group_by = q.group_by.as_deref().filter(|s| !s.is_empty());

    match state.store.read(since, group_by).await {
        Ok(summary) => Ok(Json(summary)),
        Err(e) => {
            tracing::warn!(error = %e, ?since, ?group_by, "chart read failed");
            Err(ApiError(e))
        }
    }
}

async fn ingest(State(state): State<AppState>, body: String) -> StatusCode {
    match state.publisher.publish(body).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            tracing::error!(error = %e, topic = state.publisher.topic(), "cannot publish");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
