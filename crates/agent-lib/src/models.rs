//! Core data models for the autopause engine

use crate::azure::resource::CapacityResourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Provisioning state reported by the control plane for a capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    Succeeded,
    Provisioning,
    Preparing,
    Updating,
    Scaling,
    Resuming,
    Suspending,
    Suspended,
    Pausing,
    Paused,
    Deleting,
    Failed,
}

impl ProvisioningState {
    /// Only a settled, running capacity is eligible for idle evaluation
    pub fn is_ready(&self) -> bool {
        matches!(self, ProvisioningState::Succeeded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningState::Succeeded => "Succeeded",
            ProvisioningState::Provisioning => "Provisioning",
            ProvisioningState::Preparing => "Preparing",
            ProvisioningState::Updating => "Updating",
            ProvisioningState::Scaling => "Scaling",
            ProvisioningState::Resuming => "Resuming",
            ProvisioningState::Suspending => "Suspending",
            ProvisioningState::Suspended => "Suspended",
            ProvisioningState::Pausing => "Pausing",
            ProvisioningState::Paused => "Paused",
            ProvisioningState::Deleting => "Deleting",
            ProvisioningState::Failed => "Failed",
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when the control plane reports a state string we do not know
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provisioning state '{0}'")]
pub struct UnknownState(pub String);

impl FromStr for ProvisioningState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s.trim().to_ascii_lowercase().as_str() {
            "succeeded" => ProvisioningState::Succeeded,
            "provisioning" => ProvisioningState::Provisioning,
            "preparing" => ProvisioningState::Preparing,
            "updating" => ProvisioningState::Updating,
            "scaling" => ProvisioningState::Scaling,
            "resuming" => ProvisioningState::Resuming,
            "suspending" => ProvisioningState::Suspending,
            "suspended" => ProvisioningState::Suspended,
            "pausing" => ProvisioningState::Pausing,
            "paused" => ProvisioningState::Paused,
            "deleting" => ProvisioningState::Deleting,
            "failed" => ProvisioningState::Failed,
            _ => return Err(UnknownState(s.to_string())),
        };
        Ok(state)
    }
}

/// Opaque handle used to issue lifecycle actions against a capacity.
///
/// Only the control plane that produced it knows how to interpret it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityHandle {
    arm_id: String,
}

impl CapacityHandle {
    pub fn new(arm_id: impl Into<String>) -> Self {
        Self {
            arm_id: arm_id.into(),
        }
    }

    /// Fully qualified ARM id the action is addressed to
    pub fn arm_id(&self) -> &str {
        &self.arm_id
    }
}

/// Snapshot of the target capacity taken at the start of a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityDescriptor {
    pub resource: CapacityResourceId,
    pub state: ProvisioningState,
    pub handle: CapacityHandle,
}

/// Lifecycle operation kinds found in the activity history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Resume,
    Suspend,
    Other(String),
}

impl OperationKind {
    /// Parse an ARM operation name such as
    /// `MICROSOFT.POWERBIDEDICATED/CAPACITIES/RESUME/ACTION`
    pub fn from_operation_name(name: &str) -> Self {
        let upper = name.to_ascii_uppercase();
        if upper.ends_with("/RESUME/ACTION") {
            OperationKind::Resume
        } else if upper.ends_with("/SUSPEND/ACTION") {
            OperationKind::Suspend
        } else {
            OperationKind::Other(name.to_string())
        }
    }

    /// Action segment used in ARM operation names
    pub fn action_segment(&self) -> &str {
        match self {
            OperationKind::Resume => "RESUME",
            OperationKind::Suspend => "SUSPEND",
            OperationKind::Other(name) => name,
        }
    }
}

/// Outcome of a recorded operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    Success,
    Failure,
    Other(String),
}

impl OperationOutcome {
    pub fn from_status(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "success" | "succeeded" => OperationOutcome::Success,
            "failure" | "failed" => OperationOutcome::Failure,
            _ => OperationOutcome::Other(status.to_string()),
        }
    }

    /// Status value as written by the activity log
    pub fn status_value(&self) -> &str {
        match self {
            OperationOutcome::Success => "Success",
            OperationOutcome::Failure => "Failure",
            OperationOutcome::Other(status) => status,
        }
    }
}

/// One lifecycle event observed in the activity history.
/// `timestamp` is `None` when the log row carried no usable time; the
/// record still counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub timestamp: Option<DateTime<Utc>>,
    pub operation: OperationKind,
    pub outcome: OperationOutcome,
    pub initiator: Option<String>,
}

impl ActivityRecord {
    pub fn is_successful_resume(&self) -> bool {
        self.operation == OperationKind::Resume && self.outcome == OperationOutcome::Success
    }
}

/// One aggregated utilization bucket. `maximum` is `None` when the
/// service returned the bucket without an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub maximum: Option<f64>,
}

/// Highest observed value across all buckets, ignoring empty ones
pub fn peak_utilization(samples: &[MetricSample]) -> Option<f64> {
    samples
        .iter()
        .filter_map(|s| s.maximum)
        .filter(|v| !v.is_nan())
        .fold(None, |peak, v| match peak {
            Some(p) if p >= v => Some(p),
            _ => Some(v),
        })
}

/// Decision reached by the idleness evaluator for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Capacity is not in the `Succeeded` state
    NotReady,
    /// A resume happened inside the guard window
    RecentlyResumed,
    /// Utilization observed, or no data to judge by
    Active,
    /// Zero utilization across the whole idle window
    Idle,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::NotReady => "not_ready",
            Verdict::RecentlyResumed => "recently_resumed",
            Verdict::Active => "active",
            Verdict::Idle => "idle",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the pause executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Skipped,
    Paused,
    /// Verdict was idle but dry-run mode suppressed the suspend call
    WouldPause,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Skipped => "skipped",
            Outcome::Paused => "paused",
            Outcome::WouldPause => "would_pause",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one completed cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub resource_id: String,
    pub state: ProvisioningState,
    pub verdict: Verdict,
    pub outcome: Outcome,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    pub finished_at: DateTime<Utc>,
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
