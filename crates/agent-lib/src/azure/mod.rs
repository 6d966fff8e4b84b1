//! Azure collaborators consumed by the engine
//!
//! The engine only sees the three traits below. The REST-backed
//! implementations talk to:
//! - Azure Resource Manager (capacity state, suspend)
//! - Log Analytics (activity history)
//! - Azure Monitor (utilization metrics)

pub mod arm;
pub mod auth;
pub mod logs;
pub mod metrics;
pub mod resource;
pub mod rest;

pub use arm::ArmControlPlane;
pub use auth::{ClientSecretCredential, ManagedIdentityCredential, TokenProvider};
pub use logs::LogAnalyticsActivityLog;
pub use metrics::MonitorMetricsQuery;
pub use resource::CapacityResourceId;
pub use rest::RestClient;

use crate::error::{ClientError, ConfigurationError};
use crate::models::{ActivityRecord, CapacityHandle, MetricSample, OperationKind, OperationOutcome};
use crate::settings::{CredentialSettings, Settings};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Typed view of a capacity as returned by the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityProperties {
    /// Fully qualified ARM id
    pub id: String,
    pub name: String,
    /// Raw state string, parsed by the prober
    pub state: String,
    pub sku: Option<String>,
}

/// Capacity lifecycle operations
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Read the capacity's current state
    async fn get_capacity(
        &self,
        resource: &CapacityResourceId,
    ) -> Result<CapacityProperties, ClientError>;

    /// Suspend the capacity and wait until the operation is terminal
    async fn suspend(&self, handle: &CapacityHandle) -> Result<(), ClientError>;
}

/// Lifecycle activity history
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Operations of `kind` with `outcome` against `resource` in the trailing `window`
    async fn query_recent_operations(
        &self,
        resource: &CapacityResourceId,
        kind: OperationKind,
        outcome: OperationOutcome,
        window: Duration,
    ) -> Result<Vec<ActivityRecord>, ClientError>;
}

/// Utilization metrics
#[async_trait]
pub trait MetricsQuery: Send + Sync {
    /// Per-bucket maxima of `metric_name` over the trailing `window`
    async fn query_max_metric(
        &self,
        resource: &CapacityResourceId,
        metric_name: &str,
        window: Duration,
        granularity: Duration,
    ) -> Result<Vec<MetricSample>, ClientError>;
}

/// The three REST-backed collaborators, built from settings
#[derive(Clone)]
pub struct AzureClients {
    pub control_plane: Arc<dyn ControlPlane>,
    pub activity_log: Arc<dyn ActivityLog>,
    pub metrics: Arc<dyn MetricsQuery>,
}

impl AzureClients {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigurationError> {
        let http = rest::build_http_client(settings.request_timeout)
            .map_err(ConfigurationError::HttpClient)?;

        let credential: Arc<dyn TokenProvider> = match &settings.credential {
            CredentialSettings::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => Arc::new(ClientSecretCredential::new(
                http.clone(),
                settings.endpoints.authority_host.clone(),
                tenant_id.clone(),
                client_id.clone(),
                client_secret.clone(),
            )),
            CredentialSettings::ManagedIdentity {
                endpoint,
                client_id,
            } => Arc::new(ManagedIdentityCredential::new(
                http.clone(),
                endpoint.clone(),
                client_id.clone(),
            )),
        };

        let rest_for = |base: &str, name: &'static str| {
            RestClient::new(http.clone(), base, credential.clone(), auth::scope_for(base))
                .map(|c| c.with_timeout(settings.request_timeout))
                .map_err(|e| ConfigurationError::Invalid {
                    name,
                    reason: e.to_string(),
                })
        };

        let management = rest_for(&settings.endpoints.management, "AZURE_MANAGEMENT_ENDPOINT")?;
        let log_analytics = rest_for(
            &settings.endpoints.log_analytics,
            "AZURE_LOG_ANALYTICS_ENDPOINT",
        )?;

        Ok(Self {
            control_plane: Arc::new(
                ArmControlPlane::new(management.clone())
                    .with_operation_timeout(settings.suspend_timeout)
                    .with_poll_interval(settings.poll_interval),
            ),
            activity_log: Arc::new(LogAnalyticsActivityLog::new(log_analytics)),
            metrics: Arc::new(MonitorMetricsQuery::new(management)),
        })
    }
}
