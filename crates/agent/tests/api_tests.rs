//! Integration tests for the agent API endpoints

use autopause_agent::api::{create_router, AppState};
use autopause_lib::{
    error::{ClientError, CycleError, EvaluationError, ProbeError},
    health::HealthRegistry,
    models::{CycleReport, Outcome, ProvisioningState, Verdict},
    observability::AutopauseMetrics,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const RESOURCE: &str =
    "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.PowerBIDedicated/capacities/cap01";

fn setup_test_app() -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(HealthRegistry::new(), AutopauseMetrics::new()));
    (create_router(state.clone()), state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn report(verdict: Verdict, outcome: Outcome) -> CycleReport {
    CycleReport {
        resource_id: RESOURCE.into(),
        state: ProvisioningState::Succeeded,
        verdict,
        outcome,
        elapsed: Duration::from_millis(850),
        finished_at: chrono::Utc::now(),
    }
}

fn throttled_activity_log() -> CycleError {
    CycleError::Evaluation {
        resource_id: RESOURCE.into(),
        source: EvaluationError::ActivityQuery(ClientError::Status {
            status: 429,
            body: "throttled".into(),
        }),
    }
}

fn capacity_gone() -> CycleError {
    CycleError::Probe {
        resource_id: RESOURCE.into(),
        source: ProbeError::NotFound,
    }
}

#[tokio::test]
async fn test_healthz_lists_every_component() {
    let (app, _state) = setup_test_app();

    let (status, health) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    for name in ["control_plane", "activity_log", "metrics", "scheduler"] {
        assert_eq!(health["components"][name]["status"], "healthy", "{name}");
    }
}

#[tokio::test]
async fn test_healthz_ok_while_degraded() {
    let (app, state) = setup_test_app();
    state
        .health_registry
        .record_failure(&throttled_activity_log())
        .await;

    let (status, health) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");

    let activity_log = &health["components"]["activity_log"];
    assert_eq!(activity_log["failed_stage"], "evaluate");
    assert_eq!(activity_log["consecutive_failures"], 1);
    assert!(activity_log["last_error"].as_str().unwrap().contains("429"));
}

#[tokio::test]
async fn test_healthz_503_when_capacity_missing() {
    let (app, state) = setup_test_app();
    state.health_registry.record_failure(&capacity_gone()).await;

    let (status, health) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
    assert_eq!(health["components"]["control_plane"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_component_endpoint() {
    let (app, state) = setup_test_app();
    state
        .health_registry
        .record_failure(&throttled_activity_log())
        .await;

    let (status, health) = get(app.clone(), "/healthz/activity_log").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");

    let (status, health) = get(app.clone(), "/healthz/control_plane").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");

    let (status, body) = get(app, "/healthz/database").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("database"));
}

#[tokio::test]
async fn test_readyz_503_before_first_cycle() {
    let (app, _state) = setup_test_app();

    let (status, readiness) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
    assert_eq!(readiness["reason"], "No cycle has completed yet");
}

#[tokio::test]
async fn test_readyz_ok_after_cycle() {
    let (app, state) = setup_test_app();
    state
        .health_registry
        .record_report(&report(Verdict::Active, Outcome::Skipped))
        .await;

    let (status, readiness) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_503_when_capacity_missing() {
    let (app, state) = setup_test_app();
    state.health_registry.record_failure(&capacity_gone()).await;

    let (status, readiness) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(readiness["reason"]
        .as_str()
        .unwrap()
        .starts_with("control_plane unhealthy"));
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app();

    state
        .metrics
        .record_report(&report(Verdict::Idle, Outcome::Paused));
    state.metrics.record_failure(&capacity_gone(), 0.2);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("capacity_autopause_cycles_total"));
    assert!(metrics_text.contains("capacity_autopause_verdicts_total{verdict=\"idle\"}"));
    assert!(metrics_text.contains("capacity_autopause_stage_errors_total{stage=\"probe\"}"));
    assert!(metrics_text.contains("capacity_autopause_pauses_total"));
    assert!(metrics_text.contains("capacity_autopause_cycle_duration_seconds_bucket"));
    assert!(metrics_text.contains("capacity_autopause_last_cycle_timestamp_seconds"));
}
