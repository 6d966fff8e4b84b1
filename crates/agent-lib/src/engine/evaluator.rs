//! Idleness evaluator
//!
//! Three gates, in order, each of which can end evaluation early:
//! 1. Readiness: only a `Succeeded` capacity is looked at further
//! 2. Resume guard: a successful resume inside the guard window skips the cycle
//! 3. Utilization: the max of per-bucket maxima over the idle window must be
//!    exactly zero for the capacity to count as idle
//!
//! No data at all counts as active, never as idle.

use crate::azure::{ActivityLog, MetricsQuery};
use crate::error::EvaluationError;
use crate::models::{peak_utilization, CapacityDescriptor, OperationKind, OperationOutcome, Verdict};
use crate::policy::EvaluationPolicy;
use std::sync::Arc;
use tracing::{debug, info};

pub struct IdlenessEvaluator {
    activity_log: Arc<dyn ActivityLog>,
    metrics: Arc<dyn MetricsQuery>,
}

impl IdlenessEvaluator {
    pub fn new(activity_log: Arc<dyn ActivityLog>, metrics: Arc<dyn MetricsQuery>) -> Self {
        Self {
            activity_log,
            metrics,
        }
    }

    pub async fn evaluate(
        &self,
        descriptor: &CapacityDescriptor,
        policy: &EvaluationPolicy,
    ) -> Result<Verdict, EvaluationError> {
        if !descriptor.state.is_ready() {
            debug!(state = %descriptor.state, "Capacity not ready, skipping evaluation");
            return Ok(Verdict::NotReady);
        }

        let records = self
            .activity_log
            .query_recent_operations(
                &descriptor.resource,
                OperationKind::Resume,
                OperationOutcome::Success,
                policy.resume_guard_window,
            )
            .await
            .map_err(EvaluationError::ActivityQuery)?;

        let resumes = records.iter().filter(|r| r.is_successful_resume()).count();
        if resumes > 0 {
            info!(
                resource_id = %descriptor.resource,
                resumes,
                guard_minutes = policy.resume_guard_window.as_secs() / 60,
                "Capacity resumed recently, skipping idle check"
            );
            return Ok(Verdict::RecentlyResumed);
        }

        let samples = self
            .metrics
            .query_max_metric(
                &descriptor.resource,
                &policy.metric_name,
                policy.idle_window,
                policy.granularity,
            )
            .await
            .map_err(EvaluationError::MetricsQuery)?;

        let peak = peak_utilization(&samples);
        info!(
            resource_id = %descriptor.resource,
            metric = %policy.metric_name,
            buckets = samples.len(),
            peak = ?peak,
            idle_minutes = policy.idle_window.as_secs() / 60,
            "Max utilization over idle window"
        );

        Ok(match peak {
            Some(value) if value == 0.0 => Verdict::Idle,
            _ => Verdict::Active,
        })
    }
}
