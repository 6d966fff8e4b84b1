//! Probe and scrape endpoints for the agent
//!
//! - `/healthz` reports every collaborator; 503 once one is unhealthy
//! - `/healthz/:component` reports one collaborator
//! - `/readyz` is 200 after the first cycle while nothing is unhealthy
//! - `/metrics` is the Prometheus text exposition

use autopause_lib::{
    health::{Component, ComponentStatus, HealthRegistry},
    observability::AutopauseMetrics,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

const TEXT_PLAIN: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: AutopauseMetrics,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, metrics: AutopauseMetrics) -> Self {
        Self {
            health_registry,
            metrics,
        }
    }
}

fn availability(status: ComponentStatus) -> StatusCode {
    if status == ComponentStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    let health = state.health_registry.health().await;
    (availability(health.status), Json(health)).into_response()
}

async fn component_health(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    let component: Component = match name.parse() {
        Ok(component) => component,
        Err(e) => {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() })))
                .into_response()
        }
    };

    let health = state.health_registry.component(component).await;
    (availability(health.status), Json(health)).into_response()
}

async fn readyz(State(state): State<Arc<AppState>>) -> Response {
    let readiness = state.health_registry.readiness().await;
    let code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(readiness)).into_response()
}

async fn metrics() -> Response {
    let mut buffer = Vec::new();
    match TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => (StatusCode::OK, [("content-type", TEXT_PLAIN)], buffer).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/healthz/:component", get(component_health))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, create_router(state)).await?;

    Ok(())
}
