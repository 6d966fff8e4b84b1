//! One probe, evaluate and execute pass against the target capacity

use super::{IdlenessEvaluator, PauseExecutor, StateProber};
use crate::azure::{ActivityLog, AzureClients, CapacityResourceId, ControlPlane, MetricsQuery};
use crate::error::{ConfigurationError, CycleError};
use crate::models::{CapacityDescriptor, CycleReport, Verdict};
use crate::policy::EvaluationPolicy;
use crate::settings::Settings;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::Instant;

/// State and verdict without any action taken
#[derive(Debug, Clone)]
pub struct Assessment {
    pub descriptor: CapacityDescriptor,
    pub verdict: Verdict,
}

/// The three pipeline stages wired to one capacity and policy
pub struct PauseCycle {
    resource: CapacityResourceId,
    policy: EvaluationPolicy,
    prober: StateProber,
    evaluator: IdlenessEvaluator,
    executor: PauseExecutor,
}

impl PauseCycle {
    /// Wire a cycle to the REST-backed Azure clients described by `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigurationError> {
        let clients = AzureClients::from_settings(settings)?;
        Ok(Self::from_parts(
            settings.resource.clone(),
            settings.policy.clone(),
            clients,
            settings.dry_run,
        ))
    }

    fn from_parts(
        resource: CapacityResourceId,
        policy: EvaluationPolicy,
        clients: AzureClients,
        dry_run: bool,
    ) -> Self {
        Self {
            resource,
            policy,
            prober: StateProber::new(clients.control_plane.clone()),
            evaluator: IdlenessEvaluator::new(clients.activity_log, clients.metrics),
            executor: PauseExecutor::new(clients.control_plane, dry_run),
        }
    }

    pub fn resource(&self) -> &CapacityResourceId {
        &self.resource
    }

    pub fn policy(&self) -> &EvaluationPolicy {
        &self.policy
    }

    pub fn is_dry_run(&self) -> bool {
        self.executor.is_dry_run()
    }

    /// Probe and evaluate only. Never suspends.
    pub async fn assess(&self) -> Result<Assessment, CycleError> {
        let resource_id = self.resource.to_string();

        let descriptor = self
            .prober
            .probe(&self.resource)
            .await
            .map_err(|source| CycleError::Probe {
                resource_id: resource_id.clone(),
                source,
            })?;

        let verdict = self
            .evaluator
            .evaluate(&descriptor, &self.policy)
            .await
            .map_err(|source| CycleError::Evaluation {
                resource_id: resource_id.clone(),
                source,
            })?;

        Ok(Assessment {
            descriptor,
            verdict,
        })
    }

    /// Run one full cycle. Failures are terminal for this cycle only.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let start = Instant::now();
        let Assessment {
            descriptor,
            verdict,
        } = self.assess().await?;

        let outcome = self
            .executor
            .execute(&descriptor, verdict)
            .await
            .map_err(|source| CycleError::Execution {
                resource_id: self.resource.to_string(),
                source,
            })?;

        Ok(CycleReport {
            resource_id: self.resource.to_string(),
            state: descriptor.state,
            verdict,
            outcome,
            elapsed: start.elapsed(),
            finished_at: Utc::now(),
        })
    }
}

/// Builder for assembling a cycle from individual collaborators
pub struct PauseCycleBuilder {
    resource: Option<CapacityResourceId>,
    policy: EvaluationPolicy,
    control_plane: Option<Arc<dyn ControlPlane>>,
    activity_log: Option<Arc<dyn ActivityLog>>,
    metrics: Option<Arc<dyn MetricsQuery>>,
    dry_run: bool,
}

impl PauseCycleBuilder {
    pub fn new() -> Self {
        Self {
            resource: None,
            policy: EvaluationPolicy::default(),
            control_plane: None,
            activity_log: None,
            metrics: None,
            dry_run: false,
        }
    }

    pub fn resource(mut self, resource: CapacityResourceId) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn policy(mut self, policy: EvaluationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn control_plane(mut self, control_plane: Arc<dyn ControlPlane>) -> Self {
        self.control_plane = Some(control_plane);
        self
    }

    pub fn activity_log(mut self, activity_log: Arc<dyn ActivityLog>) -> Self {
        self.activity_log = Some(activity_log);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsQuery>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set all three collaborators at once
    pub fn clients(self, clients: AzureClients) -> Self {
        self.control_plane(clients.control_plane)
            .activity_log(clients.activity_log)
            .metrics(clients.metrics)
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn build(self) -> Result<PauseCycle> {
        let resource = self
            .resource
            .ok_or_else(|| anyhow::anyhow!("Target capacity is required"))?;
        let control_plane = self
            .control_plane
            .ok_or_else(|| anyhow::anyhow!("Control plane is required"))?;
        let activity_log = self
            .activity_log
            .ok_or_else(|| anyhow::anyhow!("Activity log is required"))?;
        let metrics = self
            .metrics
            .ok_or_else(|| anyhow::anyhow!("Metrics query is required"))?;

        Ok(PauseCycle::from_parts(
            resource,
            self.policy,
            AzureClients {
                control_plane,
                activity_log,
                metrics,
            },
            self.dry_run,
        ))
    }
}

impl Default for PauseCycleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
