//! Authenticated REST client shared by the Azure collaborators

use super::auth::TokenProvider;
use crate::error::ClientError;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client used for every Azure call
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("capacity-autopause/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// REST client bound to one Azure endpoint and token scope
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: Url,
    credential: Arc<dyn TokenProvider>,
    scope: String,
    timeout: Duration,
}

impl RestClient {
    pub fn new(
        client: Client,
        base_url: &str,
        credential: Arc<dyn TokenProvider>,
        scope: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            credential,
            scope: scope.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Timeout reported when a request times out; the client enforces it
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve an absolute path (such as an ARM id) against the base URL
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ClientError> {
        let mut url = self.base_url.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn authorized(&self, method: Method, url: Url) -> Result<RequestBuilder, ClientError> {
        let token = self.credential.token(&self.scope).await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await.map_err(|e| self.transport(e))?;
        check_status(response).await
    }

    fn transport(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else {
            ClientError::Transport(err)
        }
    }

    /// GET a URL and return the raw response after the status check
    pub async fn get_raw(&self, url: Url) -> Result<Response, ClientError> {
        let request = self.authorized(Method::GET, url).await?;
        self.send(request).await
    }

    /// GET a URL and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let response = self.get_raw(url).await?;
        decode_json(response).await
    }

    /// POST a JSON body and decode the JSON response
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, ClientError> {
        let request = self.authorized(Method::POST, url).await?.json(body);
        let response = self.send(request).await?;
        decode_json(response).await
    }

    /// POST without a body, returning the raw response (used for ARM actions)
    pub async fn post_empty(&self, url: Url) -> Result<Response, ClientError> {
        let request = self
            .authorized(Method::POST, url)
            .await?
            .header(reqwest::header::CONTENT_LENGTH, 0);
        self.send(request).await
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(url));
    }

    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

pub(crate) async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Format a duration as an ISO 8601 duration (`PT15M`, `PT90S`)
pub fn iso8601_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs > 0 && secs % 3600 == 0 {
        format!("PT{}H", secs / 3600)
    } else if secs > 0 && secs % 60 == 0 {
        format!("PT{}M", secs / 60)
    } else {
        format!("PT{}S", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso8601_duration() {
        assert_eq!(iso8601_duration(Duration::from_secs(15 * 60)), "PT15M");
        assert_eq!(iso8601_duration(Duration::from_secs(3600)), "PT1H");
        assert_eq!(iso8601_duration(Duration::from_secs(90)), "PT90S");
        assert_eq!(iso8601_duration(Duration::from_secs(45 * 60)), "PT45M");
    }
}
