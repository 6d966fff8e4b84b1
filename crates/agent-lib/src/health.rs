//! Collaborator health for the autopause agent
//!
//! The cycle loop feeds every cycle outcome in through
//! [`HealthRegistry::record_report`] or [`HealthRegistry::record_failure`].
//! A completed cycle marks healthy only the collaborators its verdict needed;
//! a failed one is charged to the collaborator behind the failing stage.
//! Collaborators a cycle never reached keep their previous health.

use crate::error::{CycleError, EvaluationError, ProbeError, Stage};
use crate::models::{CycleReport, Verdict};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Consecutive failures after which a collaborator counts as unhealthy
pub const UNHEALTHY_AFTER_FAILURES: u32 = 3;

/// What the agent depends on to run a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    ControlPlane,
    ActivityLog,
    Metrics,
    Scheduler,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::ControlPlane,
        Component::ActivityLog,
        Component::Metrics,
        Component::Scheduler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::ControlPlane => "control_plane",
            Component::ActivityLog => "activity_log",
            Component::Metrics => "metrics",
            Component::Scheduler => "scheduler",
        }
    }

    /// Collaborators a completed cycle talked to, given its verdict
    fn reached_by(verdict: Verdict) -> &'static [Component] {
        match verdict {
            Verdict::NotReady => &[Component::ControlPlane],
            Verdict::RecentlyResumed => &[Component::ControlPlane, Component::ActivityLog],
            Verdict::Active | Verdict::Idle => &[
                Component::ControlPlane,
                Component::ActivityLog,
                Component::Metrics,
            ],
        }
    }

    /// Collaborator behind a failed cycle, and whether retrying can help
    fn blamed_for(err: &CycleError) -> (Component, bool) {
        match err {
            CycleError::Probe { source, .. } => (
                Component::ControlPlane,
                matches!(
                    source,
                    ProbeError::NotFound
                        | ProbeError::ForeignResource { .. }
                        | ProbeError::MalformedId(_)
                ),
            ),
            CycleError::Evaluation {
                source: EvaluationError::ActivityQuery(_),
                ..
            } => (Component::ActivityLog, false),
            CycleError::Evaluation {
                source: EvaluationError::MetricsQuery(_),
                ..
            } => (Component::Metrics, false),
            CycleError::Execution { .. } => (Component::ControlPlane, false),
        }
    }
}

impl FromStr for Component {
    type Err = UnknownComponent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Component::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownComponent(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown component '{0}'")]
pub struct UnknownComponent(pub String);

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Recent failures, still retried every cycle
    Degraded,
    /// Persistent or unrecoverable failure
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
}

impl Default for ComponentHealth {
    fn default() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            consecutive_failures: 0,
            failed_stage: None,
            last_error: None,
            last_success: None,
        }
    }
}

impl ComponentHealth {
    fn succeed(&mut self, at: DateTime<Utc>) {
        *self = Self {
            last_success: Some(at),
            ..Self::default()
        };
    }

    fn fail(&mut self, stage: Stage, message: String, permanent: bool) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.failed_stage = Some(stage);
        self.last_error = Some(message);
        self.status = if permanent || self.consecutive_failures >= UNHEALTHY_AFTER_FAILURES {
            ComponentStatus::Unhealthy
        } else {
            ComponentStatus::Degraded
        };
    }
}

/// Snapshot served by `/healthz`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<Component, ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Snapshot served by `/readyz`
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug)]
struct HealthState {
    components: BTreeMap<Component, ComponentHealth>,
    last_cycle_at: Option<DateTime<Utc>>,
}

/// Shared, cloneable view of collaborator health
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    state: Arc<RwLock<HealthState>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        let components = Component::ALL
            .into_iter()
            .map(|c| (c, ComponentHealth::default()))
            .collect();
        Self {
            state: Arc::new(RwLock::new(HealthState {
                components,
                last_cycle_at: None,
            })),
        }
    }

    pub async fn record_report(&self, report: &CycleReport) {
        let mut state = self.state.write().await;
        for component in Component::reached_by(report.verdict) {
            state.component(*component).succeed(report.finished_at);
        }
        state.component(Component::Scheduler).succeed(report.finished_at);
        state.last_cycle_at = Some(report.finished_at);
    }

    pub async fn record_failure(&self, err: &CycleError) {
        let (component, permanent) = Component::blamed_for(err);
        let mut state = self.state.write().await;
        state
            .component(component)
            .fail(err.stage(), err.to_string(), permanent);
        state.component(Component::Scheduler).fail(
            err.stage(),
            format!("last cycle failed in {} stage", err.stage()),
            false,
        );
        state.last_cycle_at = Some(Utc::now());
    }

    pub async fn component(&self, component: Component) -> ComponentHealth {
        let state = self.state.read().await;
        state.components.get(&component).cloned().unwrap_or_default()
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        let status = state
            .components
            .values()
            .map(|h| h.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);

        HealthResponse {
            status,
            components: state.components.clone(),
            last_cycle_at: state.last_cycle_at,
        }
    }

    /// Ready once a cycle has finished and no collaborator is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        if state.last_cycle_at.is_none() {
            return ReadinessResponse {
                ready: false,
                reason: Some("No cycle has completed yet".to_string()),
            };
        }

        let unhealthy = state
            .components
            .iter()
            .find(|(_, h)| h.status == ComponentStatus::Unhealthy);

        match unhealthy {
            Some((component, health)) => ReadinessResponse {
                ready: false,
                reason: Some(format!(
                    "{} unhealthy: {}",
                    component,
                    health.last_error.as_deref().unwrap_or("unknown error")
                )),
            },
            None => ReadinessResponse {
                ready: true,
                reason: None,
            },
        }
    }
}

impl HealthState {
    fn component(&mut self, component: Component) -> &mut ComponentHealth {
        self.components.entry(component).or_default()
    }
}
