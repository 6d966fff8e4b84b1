//! Azure Resource Manager control plane for dedicated capacities
//!
//! Reads capacity state and issues the suspend action, following the
//! ARM long-running operation protocol until the action is terminal.

use super::resource::{CapacityResourceId, CAPACITY_API_VERSION};
use super::rest::{decode_json, RestClient};
use super::{CapacityProperties, ControlPlane};
use crate::error::ClientError;
use crate::models::CapacityHandle;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Default ceiling on how long a suspend may take to complete
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default delay between operation status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Upper bound applied to server supplied `Retry-After` values
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct CapacityResponse {
    id: String,
    name: String,
    #[serde(default)]
    sku: Option<SkuResponse>,
    properties: CapacityPropertiesResponse,
}

#[derive(Debug, Deserialize)]
struct SkuResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CapacityPropertiesResponse {
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AsyncOperationStatus {
    status: String,
    #[serde(default)]
    error: Option<OperationErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OperationErrorBody {
    #[serde(default)]
    message: String,
}

/// How a pending ARM operation is tracked
#[derive(Debug, Clone, PartialEq, Eq)]
enum PollTarget {
    /// `Azure-AsyncOperation` status resource
    AsyncOperation(String),
    /// `Location` header, 202 while running
    Location(String),
}

impl PollTarget {
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        header("azure-asyncoperation")
            .map(PollTarget::AsyncOperation)
            .or_else(|| header("location").map(PollTarget::Location))
    }

    fn url(&self) -> &str {
        match self {
            PollTarget::AsyncOperation(url) | PollTarget::Location(url) => url,
        }
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

/// ARM-backed implementation of [`ControlPlane`]
pub struct ArmControlPlane {
    rest: RestClient,
    operation_timeout: Duration,
    poll_interval: Duration,
}

impl ArmControlPlane {
    pub fn new(rest: RestClient) -> Self {
        Self {
            rest,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn wait_for_completion(
        &self,
        target: PollTarget,
        first_delay: Duration,
    ) -> Result<(), ClientError> {
        let url = Url::parse(target.url())?;
        let mut delay = first_delay;
        let mut polls = 0u32;

        loop {
            tokio::time::sleep(delay).await;
            polls += 1;

            let response = self.rest.get_raw(url.clone()).await?;
            delay = retry_after(response.headers()).unwrap_or(self.poll_interval);

            match &target {
                PollTarget::AsyncOperation(_) => {
                    let status: AsyncOperationStatus = decode_json(response).await?;
                    match status.status.to_ascii_lowercase().as_str() {
                        "succeeded" => {
                            debug!(polls, "Suspend operation succeeded");
                            return Ok(());
                        }
                        "failed" | "canceled" | "cancelled" => {
                            return Err(ClientError::OperationFailed {
                                message: status.error.map(|e| e.message).unwrap_or_default(),
                                status: status.status,
                            });
                        }
                        other => debug!(status = %other, polls, "Suspend still running"),
                    }
                }
                PollTarget::Location(_) => {
                    if response.status() != StatusCode::ACCEPTED {
                        debug!(polls, "Suspend operation finished");
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ControlPlane for ArmControlPlane {
    async fn get_capacity(
        &self,
        resource: &CapacityResourceId,
    ) -> Result<CapacityProperties, ClientError> {
        let url = self
            .rest
            .url(&resource.arm_path(), &[("api-version", CAPACITY_API_VERSION)])?;
        let capacity: CapacityResponse = self.rest.get_json(url).await?;

        let state = capacity
            .properties
            .state
            .ok_or_else(|| ClientError::Decode("capacity response carries no state".into()))?;

        Ok(CapacityProperties {
            id: capacity.id,
            name: capacity.name,
            state,
            sku: capacity.sku.map(|s| s.name),
        })
    }

    async fn suspend(&self, handle: &CapacityHandle) -> Result<(), ClientError> {
        let url = self.rest.url(
            &format!("{}/suspend", handle.arm_id()),
            &[("api-version", CAPACITY_API_VERSION)],
        )?;

        info!(resource_id = %handle.arm_id(), "Issuing suspend");
        let response = self.rest.post_empty(url).await?;

        if !matches!(response.status(), StatusCode::ACCEPTED | StatusCode::CREATED) {
            return Ok(());
        }

        let Some(target) = PollTarget::from_headers(response.headers()) else {
            debug!("Suspend accepted without a tracking header");
            return Ok(());
        };
        let first_delay = retry_after(response.headers()).unwrap_or(self.poll_interval);

        tokio::time::timeout(
            self.operation_timeout,
            self.wait_for_completion(target, first_delay),
        )
        .await
        .map_err(|_| ClientError::Timeout(self.operation_timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::tests::{rest_client, TOKEN};
    use mockito::Matcher;

    fn resource() -> CapacityResourceId {
        CapacityResourceId::new("sub-1", "rg-1", "cap01")
    }

    #[test]
    fn test_poll_target_prefers_async_operation() {
        let mut headers = HeaderMap::new();
        headers.insert("location", "https://arm/location".parse().unwrap());
        headers.insert("azure-asyncoperation", "https://arm/op".parse().unwrap());
        assert_eq!(
            PollTarget::from_headers(&headers),
            Some(PollTarget::AsyncOperation("https://arm/op".into()))
        );

        headers.remove("azure-asyncoperation");
        assert_eq!(
            PollTarget::from_headers(&headers),
            Some(PollTarget::Location("https://arm/location".into()))
        );
    }

    #[test]
    fn test_retry_after_is_capped() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", "5".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(5)));

        headers.insert("retry-after", "3600".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(MAX_RETRY_AFTER));
    }

    #[tokio::test]
    async fn test_get_capacity_reads_state() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", resource().arm_path().as_str())
            .match_query(Matcher::UrlEncoded(
                "api-version".into(),
                CAPACITY_API_VERSION.into(),
            ))
            .match_header("authorization", format!("Bearer {}", TOKEN).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"id":"{}","name":"cap01","sku":{{"name":"A1","tier":"PBIE_Azure"}},
                   "properties":{{"state":"Succeeded","provisioningState":"Succeeded"}}}}"#,
                resource().arm_path()
            ))
            .create_async()
            .await;

        let plane = ArmControlPlane::new(rest_client(&server.url()));
        let capacity = plane.get_capacity(&resource()).await.unwrap();

        assert_eq!(capacity.state, "Succeeded");
        assert_eq!(capacity.name, "cap01");
        assert_eq!(capacity.sku.as_deref(), Some("A1"));
        assert_eq!(capacity.id, resource().arm_path());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_capacity_without_state_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", resource().arm_path().as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"id":"{}","name":"cap01","properties":{{"provisioningState":"Succeeded"}}}}"#,
                resource().arm_path()
            ))
            .create_async()
            .await;

        let plane = ArmControlPlane::new(rest_client(&server.url()));
        let err = plane.get_capacity(&resource()).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[tokio::test]
    async fn test_get_capacity_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", resource().arm_path().as_str())
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":{"code":"ResourceNotFound"}}"#)
            .create_async()
            .await;

        let plane = ArmControlPlane::new(rest_client(&server.url()));
        let err = plane.get_capacity(&resource()).await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_suspend_completes_synchronously() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", format!("{}/suspend", resource().arm_path()).as_str())
            .match_query(Matcher::UrlEncoded(
                "api-version".into(),
                CAPACITY_API_VERSION.into(),
            ))
            .with_status(200)
            .create_async()
            .await;

        let plane = ArmControlPlane::new(rest_client(&server.url()));
        plane
            .suspend(&CapacityHandle::new(resource().arm_path()))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_suspend_polls_async_operation_until_succeeded() {
        let mut server = mockito::Server::new_async().await;
        let operation_url = format!("{}/operations/op-1", server.url());

        let _accept = server
            .mock("POST", format!("{}/suspend", resource().arm_path()).as_str())
            .match_query(Matcher::Any)
            .with_status(202)
            .with_header("azure-asyncoperation", &operation_url)
            .with_header("retry-after", "0")
            .create_async()
            .await;
        let status = server
            .mock("GET", "/operations/op-1")
            .with_status(200)
            .with_body(r#"{"status":"Succeeded"}"#)
            .expect(1)
            .create_async()
            .await;

        let plane = ArmControlPlane::new(rest_client(&server.url()))
            .with_poll_interval(Duration::from_millis(10));
        plane
            .suspend(&CapacityHandle::new(resource().arm_path()))
            .await
            .unwrap();
        status.assert_async().await;
    }

    #[tokio::test]
    async fn test_suspend_reports_failed_operation() {
        let mut server = mockito::Server::new_async().await;
        let operation_url = format!("{}/operations/op-2", server.url());

        let _accept = server
            .mock("POST", format!("{}/suspend", resource().arm_path()).as_str())
            .match_query(Matcher::Any)
            .with_status(202)
            .with_header("azure-asyncoperation", &operation_url)
            .create_async()
            .await;
        let _status = server
            .mock("GET", "/operations/op-2")
            .with_status(200)
            .with_body(r#"{"status":"Failed","error":{"code":"Conflict","message":"capacity is busy"}}"#)
            .create_async()
            .await;

        let plane = ArmControlPlane::new(rest_client(&server.url()))
            .with_poll_interval(Duration::from_millis(10));
        let err = plane
            .suspend(&CapacityHandle::new(resource().arm_path()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::OperationFailed { ref status, ref message }
                if status == "Failed" && message == "capacity is busy"
        ));
    }

    #[tokio::test]
    async fn test_suspend_times_out_while_in_progress() {
        let mut server = mockito::Server::new_async().await;
        let location = format!("{}/operations/op-3", server.url());

        let _accept = server
            .mock("POST", format!("{}/suspend", resource().arm_path()).as_str())
            .match_query(Matcher::Any)
            .with_status(202)
            .with_header("location", &location)
            .create_async()
            .await;
        let _pending = server
            .mock("GET", "/operations/op-3")
            .with_status(202)
            .create_async()
            .await;

        let plane = ArmControlPlane::new(rest_client(&server.url()))
            .with_poll_interval(Duration::from_millis(10))
            .with_operation_timeout(Duration::from_millis(150));
        let err = plane
            .suspend(&CapacityHandle::new(resource().arm_path()))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_millis(150)));
    }
}
