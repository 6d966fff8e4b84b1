//! Process-wide settings
//!
//! Loaded once at startup from an optional config file plus the process
//! environment, then validated into [`Settings`]. Missing required values
//! are fatal; nothing here is consulted again per cycle.

use crate::azure::auth::{ManagedIdentityEndpoint, IMDS_TOKEN_ENDPOINT};
use crate::azure::resource::CapacityResourceId;
use crate::error::ConfigurationError;
use crate::policy::{EvaluationPolicy, DEFAULT_METRIC_NAME, MAX_WINDOW_MINUTES};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Raw settings as they appear in the environment (lowercased) or a file
#[derive(Debug, Clone, Deserialize)]
struct RawSettings {
    azure_subscription_id: Option<String>,
    azure_resource_group_name: Option<String>,
    azure_pbi_embedded_capacity_name: Option<String>,

    #[serde(default = "default_idle_minutes")]
    idle_minutes_before_pause: u64,
    #[serde(default = "default_guard_minutes")]
    minutes_after_resume_before_idle_check: u64,
    #[serde(default = "default_metric_name")]
    autopause_metric_name: String,

    #[serde(default = "default_check_interval")]
    autopause_check_interval_secs: u64,
    #[serde(default)]
    autopause_dry_run: bool,
    #[serde(default = "default_api_port")]
    autopause_api_port: u16,
    #[serde(default = "default_request_timeout")]
    autopause_request_timeout_secs: u64,
    #[serde(default = "default_suspend_timeout")]
    autopause_suspend_timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    autopause_poll_interval_secs: u64,

    azure_tenant_id: Option<String>,
    azure_client_id: Option<String>,
    azure_client_secret: Option<String>,
    identity_endpoint: Option<String>,
    identity_header: Option<String>,

    #[serde(default = "default_authority_host")]
    azure_authority_host: String,
    #[serde(default = "default_management_endpoint")]
    azure_management_endpoint: String,
    #[serde(default = "default_log_analytics_endpoint")]
    azure_log_analytics_endpoint: String,
}

fn default_idle_minutes() -> u64 {
    45
}

fn default_guard_minutes() -> u64 {
    30
}

fn default_metric_name() -> String {
    DEFAULT_METRIC_NAME.to_string()
}

fn default_check_interval() -> u64 {
    300
}

fn default_api_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_suspend_timeout() -> u64 {
    600
}

fn default_poll_interval() -> u64 {
    10
}

fn default_authority_host() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_management_endpoint() -> String {
    "https://management.azure.com".to_string()
}

fn default_log_analytics_endpoint() -> String {
    "https://api.loganalytics.io".to_string()
}

/// How tokens are obtained
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSettings {
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    ManagedIdentity {
        endpoint: ManagedIdentityEndpoint,
        client_id: Option<String>,
    },
}

impl CredentialSettings {
    pub fn describe(&self) -> String {
        match self {
            CredentialSettings::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => format!("client secret (tenant {}, client {})", tenant_id, client_id),
            CredentialSettings::ManagedIdentity {
                endpoint,
                client_id,
            } => {
                let flavour = match endpoint {
                    ManagedIdentityEndpoint::Imds(_) => "IMDS",
                    ManagedIdentityEndpoint::AppService { .. } => "App Service",
                };
                match client_id {
                    Some(id) => format!("managed identity via {} (client {})", flavour, id),
                    None => format!("managed identity via {}", flavour),
                }
            }
        }
    }
}

impl fmt::Debug for CredentialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSettings::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            CredentialSettings::ManagedIdentity { client_id, .. } => f
                .debug_struct("ManagedIdentity")
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Azure service endpoints (overridable for sovereign clouds and tests)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authority_host: String,
    pub management: String,
    pub log_analytics: String,
}

/// Validated settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub resource: CapacityResourceId,
    pub policy: EvaluationPolicy,
    pub check_interval: Duration,
    pub dry_run: bool,
    pub api_port: u16,
    pub request_timeout: Duration,
    pub suspend_timeout: Duration,
    pub poll_interval: Duration,
    pub credential: CredentialSettings,
    pub endpoints: Endpoints,
}

impl Settings {
    /// Load from the process environment and an optional config file
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigurationError> {
        Self::load_from(file, None)
    }

    /// Load with an explicit environment map instead of the process environment
    pub fn load_from(
        file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigurationError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(Environment::default().source(env));

        let raw: RawSettings = builder.build()?.try_deserialize()?;
        raw.validate()
    }

    /// Key/value view with secrets removed, for display
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("resource_id", self.resource.arm_path()),
            (
                "idle_window_minutes",
                (self.policy.idle_window.as_secs() / 60).to_string(),
            ),
            (
                "resume_guard_minutes",
                (self.policy.resume_guard_window.as_secs() / 60).to_string(),
            ),
            ("metric_name", self.policy.metric_name.clone()),
            (
                "check_interval_secs",
                self.check_interval.as_secs().to_string(),
            ),
            ("dry_run", self.dry_run.to_string()),
            ("api_port", self.api_port.to_string()),
            ("credential", self.credential.describe()),
            ("management_endpoint", self.endpoints.management.clone()),
            ("log_analytics_endpoint", self.endpoints.log_analytics.clone()),
        ]
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigurationError> {
    non_empty(value).ok_or(ConfigurationError::Missing(name))
}

fn positive(value: u64, name: &'static str) -> Result<u64, ConfigurationError> {
    if value == 0 {
        return Err(ConfigurationError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn window_minutes(value: u64, name: &'static str) -> Result<u64, ConfigurationError> {
    let value = positive(value, name)?;
    if value > MAX_WINDOW_MINUTES {
        return Err(ConfigurationError::Invalid {
            name,
            reason: format!("must be at most {} minutes", MAX_WINDOW_MINUTES),
        });
    }
    Ok(value)
}

fn endpoint(value: String, name: &'static str) -> Result<String, ConfigurationError> {
    Url::parse(&value).map_err(|e| ConfigurationError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    Ok(value.trim_end_matches('/').to_string())
}

impl RawSettings {
    fn validate(self) -> Result<Settings, ConfigurationError> {
        let resource = CapacityResourceId::new(
            required(self.azure_subscription_id, "AZURE_SUBSCRIPTION_ID")?,
            required(self.azure_resource_group_name, "AZURE_RESOURCE_GROUP_NAME")?,
            required(
                self.azure_pbi_embedded_capacity_name,
                "AZURE_PBI_EMBEDDED_CAPACITY_NAME",
            )?,
        );

        let policy = EvaluationPolicy::from_minutes(
            window_minutes(self.idle_minutes_before_pause, "IDLE_MINUTES_BEFORE_PAUSE")?,
            window_minutes(
                self.minutes_after_resume_before_idle_check,
                "MINUTES_AFTER_RESUME_BEFORE_IDLE_CHECK",
            )?,
        )
        .with_metric_name(required(
            Some(self.autopause_metric_name),
            "AUTOPAUSE_METRIC_NAME",
        )?);

        let client_id = non_empty(self.azure_client_id);
        let credential = match non_empty(self.azure_client_secret) {
            Some(client_secret) => CredentialSettings::ClientSecret {
                tenant_id: non_empty(self.azure_tenant_id).ok_or_else(|| {
                    ConfigurationError::Invalid {
                        name: "AZURE_TENANT_ID",
                        reason: "required when AZURE_CLIENT_SECRET is set".to_string(),
                    }
                })?,
                client_id: client_id.ok_or_else(|| ConfigurationError::Invalid {
                    name: "AZURE_CLIENT_ID",
                    reason: "required when AZURE_CLIENT_SECRET is set".to_string(),
                })?,
                client_secret,
            },
            None => {
                let endpoint = match (
                    non_empty(self.identity_endpoint),
                    non_empty(self.identity_header),
                ) {
                    (Some(endpoint), Some(header)) => {
                        ManagedIdentityEndpoint::AppService { endpoint, header }
                    }
                    _ => ManagedIdentityEndpoint::Imds(IMDS_TOKEN_ENDPOINT.to_string()),
                };
                CredentialSettings::ManagedIdentity {
                    endpoint,
                    client_id,
                }
            }
        };

        Ok(Settings {
            resource,
            policy,
            check_interval: Duration::from_secs(positive(
                self.autopause_check_interval_secs,
                "AUTOPAUSE_CHECK_INTERVAL_SECS",
            )?),
            dry_run: self.autopause_dry_run,
            api_port: self.autopause_api_port,
            request_timeout: Duration::from_secs(positive(
                self.autopause_request_timeout_secs,
                "AUTOPAUSE_REQUEST_TIMEOUT_SECS",
            )?),
            suspend_timeout: Duration::from_secs(positive(
                self.autopause_suspend_timeout_secs,
                "AUTOPAUSE_SUSPEND_TIMEOUT_SECS",
            )?),
            poll_interval: Duration::from_secs(positive(
                self.autopause_poll_interval_secs,
                "AUTOPAUSE_POLL_INTERVAL_SECS",
            )?),
            credential,
            endpoints: Endpoints {
                authority_host: endpoint(self.azure_authority_host, "AZURE_AUTHORITY_HOST")?,
                management: endpoint(self.azure_management_endpoint, "AZURE_MANAGEMENT_ENDPOINT")?,
                log_analytics: endpoint(
                    self.azure_log_analytics_endpoint,
                    "AZURE_LOG_ANALYTICS_ENDPOINT",
                )?,
            },
        })
    }
}
