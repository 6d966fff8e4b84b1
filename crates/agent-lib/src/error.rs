//! Error taxonomy for the autopause engine
//!
//! Each pipeline stage has its own error type so callers can tell
//! "evaluation failed" apart from a substantive verdict. `CycleError`
//! wraps them with the resource and stage for reporting.

use crate::azure::resource::MalformedResourceId;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures talking to an Azure REST endpoint
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("credential error: {0}")]
    Auth(String),

    #[error("long-running operation ended with status {status}: {message}")]
    OperationFailed { status: String, message: String },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// State prober failures
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("capacity not found")]
    NotFound,

    #[error("control plane query failed: {0}")]
    ControlPlane(#[source] ClientError),

    #[error("unrecognised provisioning state '{0}'")]
    UnparseableState(String),

    #[error(transparent)]
    MalformedId(#[from] MalformedResourceId),

    #[error("control plane returned {actual} when asked for {expected}")]
    ForeignResource { expected: String, actual: String },
}

impl From<ClientError> for ProbeError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound(_) => ProbeError::NotFound,
            other => ProbeError::ControlPlane(other),
        }
    }
}

/// Idleness evaluator failures
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("activity log query failed: {0}")]
    ActivityQuery(#[source] ClientError),

    #[error("metrics query failed: {0}")]
    MetricsQuery(#[source] ClientError),
}

/// Pause executor failures
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("suspend request failed: {0}")]
    Failed(#[source] ClientError),

    #[error("suspend did not complete within {0:?}")]
    TimedOut(Duration),
}

impl From<ClientError> for ExecutionError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Timeout(after) => ExecutionError::TimedOut(after),
            other => ExecutionError::Failed(other),
        }
    }
}

/// Startup-only configuration problems
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("required setting {0} is missing")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Pipeline stage a cycle failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Probe,
    Evaluate,
    Execute,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Probe => "probe",
            Stage::Evaluate => "evaluate",
            Stage::Execute => "execute",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed cycle. Never escapes the cycle loop.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("probe of {resource_id} failed: {source}")]
    Probe {
        resource_id: String,
        #[source]
        source: ProbeError,
    },

    #[error("evaluation of {resource_id} failed: {source}")]
    Evaluation {
        resource_id: String,
        #[source]
        source: EvaluationError,
    },

    #[error("pausing {resource_id} failed: {source}")]
    Execution {
        resource_id: String,
        #[source]
        source: ExecutionError,
    },
}

impl CycleError {
    pub fn stage(&self) -> Stage {
        match self {
            CycleError::Probe { .. } => Stage::Probe,
            CycleError::Evaluation { .. } => Stage::Evaluate,
            CycleError::Execution { .. } => Stage::Execute,
        }
    }

    pub fn resource_id(&self) -> &str {
        match self {
            CycleError::Probe { resource_id, .. }
            | CycleError::Evaluation { resource_id, .. }
            | CycleError::Execution { resource_id, .. } => resource_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_probe_not_found() {
        let err: ProbeError = ClientError::NotFound("/subscriptions/x".into()).into();
        assert!(matches!(err, ProbeError::NotFound));

        let err: ProbeError = ClientError::Decode("bad json".into()).into();
        assert!(matches!(err, ProbeError::ControlPlane(_)));
    }

    #[test]
    fn test_timeout_maps_to_execution_timed_out() {
        let err: ExecutionError = ClientError::Timeout(Duration::from_secs(600)).into();
        assert!(matches!(err, ExecutionError::TimedOut(d) if d == Duration::from_secs(600)));
    }

    #[test]
    fn test_cycle_error_carries_context() {
        let err = CycleError::Evaluation {
            resource_id: "/subscriptions/s/resourceGroups/rg".into(),
            source: EvaluationError::MetricsQuery(ClientError::Status {
                status: 429,
                body: "throttled".into(),
            }),
        };

        assert_eq!(err.stage(), Stage::Evaluate);
        assert_eq!(err.resource_id(), "/subscriptions/s/resourceGroups/rg");
        let message = err.to_string();
        assert!(message.contains("/subscriptions/s/resourceGroups/rg"));
        assert!(message.contains("throttled"));
    }
}
