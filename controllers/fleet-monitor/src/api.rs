//! Read-only query surface.
//!
//! - `GET /clusters` - identities of working and accessible clusters
//! - `GET /clusters/{name}` - whether any such identity contains `name`
//! - `GET /metrics` - Prometheus exposition of the cluster gauges
//! - `GET /health` - liveness

use crate::cluster::FleetRegistry;
use crate::error::MonitorError;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state of the query handlers
#[derive(Clone)]
pub struct ApiState {
    /// Fleet whose working clusters and gauges are served
    pub registry: Arc<FleetRegistry>,
}

/// Routes of the query surface, with request tracing
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/clusters", get(working_clusters))
        .route("/clusters/{name}", get(is_cluster_working))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the query surface until the listener fails.
pub async fn serve(listener: TcpListener, state: ApiState) -> Result<(), MonitorError> {
    info!("Query surface listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .await
        .map_err(|e| MonitorError::Server(e.to_string()))
}

async fn working_clusters(State(state): State<ApiState>) -> Json<BTreeSet<String>> {
    Json(state.registry.working_clusters().await)
}

async fn is_cluster_working(State(state): State<ApiState>, Path(name): Path<String>) -> Json<bool> {
    let working = state.registry.working_clusters().await;
    Json(working.iter().any(|identity| identity.contains(&name)))
}

async fn metrics(State(state): State<ApiState>) -> Response {
    match state.registry.sink().encode() {
        Ok(text) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health() -> &'static str {
    "healthy"
}
