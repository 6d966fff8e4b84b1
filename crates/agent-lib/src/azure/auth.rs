//! Credential acquisition for Azure REST calls
//!
//! Two credential flavours are supported:
//! - Client secret (service principal) against the AAD v2 token endpoint
//! - Managed identity, via the App Service identity endpoint when
//!   `IDENTITY_ENDPOINT`/`IDENTITY_HEADER` are present, otherwise IMDS
//!
//! Tokens are cached per scope and refreshed shortly before they expire.

use crate::error::ClientError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Token scope for the service behind `endpoint`, e.g.
/// `https://management.usgovcloudapi.net/.default`
pub fn scope_for(endpoint: &str) -> String {
    format!("{}/.default", endpoint.trim_end_matches('/'))
}

/// Default Azure Instance Metadata Service token endpoint
pub const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Refresh tokens this long before they expire
const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Source of bearer tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a bearer token valid for `scope`
    async fn token(&self, scope: &str) -> Result<String, ClientError>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Per-scope token cache shared by the credential implementations
#[derive(Debug, Default)]
struct TokenCache {
    tokens: Mutex<HashMap<String, CachedToken>>,
}

impl TokenCache {
    async fn get(&self, scope: &str) -> Option<String> {
        let tokens = self.tokens.lock().await;
        tokens
            .get(scope)
            .filter(|t| Instant::now() < t.refresh_at)
            .map(|t| t.value.clone())
    }

    async fn put(&self, scope: &str, value: String, expires_in: Duration) {
        let lifetime = expires_in.saturating_sub(REFRESH_MARGIN);
        let mut tokens = self.tokens.lock().await;
        tokens.insert(
            scope.to_string(),
            CachedToken {
                value,
                refresh_at: Instant::now() + lifetime,
            },
        );
    }
}

/// Token endpoint response. IMDS returns `expires_in` as a string,
/// AAD returns a number.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    expires_in: Option<u64>,
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

impl TokenResponse {
    fn lifetime(&self) -> Duration {
        // One hour when no expiry hint is given
        Duration::from_secs(self.expires_in.unwrap_or(3600))
    }
}

async fn read_token_response(response: reqwest::Response) -> Result<TokenResponse, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Auth(format!(
            "token endpoint returned {}: {}",
            status, body
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| ClientError::Auth(format!("unreadable token response: {}", e)))
}

/// Service principal credential using a client secret
pub struct ClientSecretCredential {
    client: Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    cache: TokenCache,
}

impl ClientSecretCredential {
    pub fn new(
        client: Client,
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            authority_host: authority_host.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cache: TokenCache::default(),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

#[async_trait]
impl TokenProvider for ClientSecretCredential {
    async fn token(&self, scope: &str) -> Result<String, ClientError> {
        if let Some(token) = self.cache.get(scope).await {
            return Ok(token);
        }

        debug!(scope = %scope, "Requesting client secret token");

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = self
            .client
            .post(self.token_url())
            .form(&params)
            .send()
            .await?;

        let token = read_token_response(response).await?;
        self.cache
            .put(scope, token.access_token.clone(), token.lifetime())
            .await;

        Ok(token.access_token)
    }
}

/// Where a managed identity token is requested from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedIdentityEndpoint {
    /// Instance Metadata Service (VMs, AKS)
    Imds(String),
    /// App Service / Functions identity endpoint with its secret header
    AppService { endpoint: String, header: String },
}

/// Managed identity credential (system or user assigned)
pub struct ManagedIdentityCredential {
    client: Client,
    endpoint: ManagedIdentityEndpoint,
    client_id: Option<String>,
    cache: TokenCache,
}

impl ManagedIdentityCredential {
    pub fn new(client: Client, endpoint: ManagedIdentityEndpoint, client_id: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            client_id,
            cache: TokenCache::default(),
        }
    }
}

/// Managed identity endpoints take a resource, not a `/.default` scope
fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

#[async_trait]
impl TokenProvider for ManagedIdentityCredential {
    async fn token(&self, scope: &str) -> Result<String, ClientError> {
        if let Some(token) = self.cache.get(scope).await {
            return Ok(token);
        }

        let resource = scope_to_resource(scope);
        debug!(resource = %resource, "Requesting managed identity token");

        let mut query: Vec<(&str, &str)> = vec![("resource", resource)];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let request = match &self.endpoint {
            ManagedIdentityEndpoint::Imds(url) => {
                query.push(("api-version", "2018-02-01"));
                self.client.get(url).header("Metadata", "true")
            }
            ManagedIdentityEndpoint::AppService { endpoint, header } => {
                query.push(("api-version", "2019-08-01"));
                self.client.get(endpoint).header("X-IDENTITY-HEADER", header)
            }
        };

        let response = request.query(&query).send().await?;
        let token = read_token_response(response).await?;
        self.cache
            .put(scope, token.access_token.clone(), token.lifetime())
            .await;

        Ok(token.access_token)
    }
}
