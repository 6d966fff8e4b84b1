//! Utilization metrics from Azure Monitor

use super::resource::CapacityResourceId;
use super::rest::{iso8601_duration, RestClient};
use super::MetricsQuery;
use crate::error::ClientError;
use crate::models::MetricSample;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Azure Monitor metrics API version
pub const METRICS_API_VERSION: &str = "2018-01-01";

#[derive(Debug, Deserialize)]
struct MetricsResponse {
    #[serde(default)]
    value: Vec<MetricResponse>,
}

#[derive(Debug, Deserialize)]
struct MetricResponse {
    #[serde(default)]
    timeseries: Vec<TimeSeriesResponse>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(default)]
    data: Vec<DataPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataPoint {
    time_stamp: DateTime<Utc>,
    #[serde(default)]
    maximum: Option<f64>,
}

/// `start/end` timespan ending at `now`
fn timespan(now: DateTime<Utc>, window: Duration) -> Result<String, ClientError> {
    let out_of_range =
        || ClientError::InvalidRequest(format!("metric window {:?} is out of range", window));
    let start = chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(out_of_range)?;
    Ok(format!(
        "{}/{}",
        start.to_rfc3339_opts(SecondsFormat::Secs, true),
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    ))
}

/// Azure Monitor implementation of [`MetricsQuery`]
pub struct MonitorMetricsQuery {
    rest: RestClient,
}

impl MonitorMetricsQuery {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl MetricsQuery for MonitorMetricsQuery {
    async fn query_max_metric(
        &self,
        resource: &CapacityResourceId,
        metric_name: &str,
        window: Duration,
        granularity: Duration,
    ) -> Result<Vec<MetricSample>, ClientError> {
        let timespan = timespan(Utc::now(), window)?;
        let interval = iso8601_duration(granularity);
        let url = self.rest.url(
            &format!("{}/providers/microsoft.insights/metrics", resource.arm_path()),
            &[
                ("api-version", METRICS_API_VERSION),
                ("metricnames", metric_name),
                ("timespan", timespan.as_str()),
                ("interval", interval.as_str()),
                ("aggregation", "Maximum"),
            ],
        )?;

        let response: MetricsResponse = self.rest.get_json(url).await?;

        let samples: Vec<MetricSample> = response
            .value
            .into_iter()
            .flat_map(|m| m.timeseries)
            .flat_map(|ts| ts.data)
            .map(|point| MetricSample {
                timestamp: point.time_stamp,
                maximum: point.maximum,
            })
            .collect();

        debug!(
            resource_id = %resource,
            metric = %metric_name,
            buckets = samples.len(),
            "Metrics query returned"
        );
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::tests::rest_client;
    use chrono::TimeZone;
    use mockito::Matcher;

    fn resource() -> CapacityResourceId {
        CapacityResourceId::new("sub-1", "rg-1", "cap01")
    }

    #[test]
    fn test_timespan_covers_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(
            timespan(now, Duration::from_secs(45 * 60)).unwrap(),
            "2024-05-01T11:15:00Z/2024-05-01T12:00:00Z"
        );
    }

    #[test]
    fn test_timespan_rejects_window_out_of_range() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let err = timespan(now, Duration::from_secs(u64::MAX)).unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_query_max_metric_flattens_series() {
        let mut server = mockito::Server::new_async().await;
        let path = format!(
            "{}/providers/microsoft.insights/metrics",
            resource().arm_path()
        );
        let mock = server
            .mock("GET", path.as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("metricnames".into(), "cpu_metric".into()),
                Matcher::UrlEncoded("interval".into(), "PT15M".into()),
                Matcher::UrlEncoded("aggregation".into(), "Maximum".into()),
                Matcher::UrlEncoded("api-version".into(), METRICS_API_VERSION.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"value":[{"name":{"value":"cpu_metric"},"unit":"Percent","timeseries":[
                    {"metadatavalues":[],"data":[
                        {"timeStamp":"2024-05-01T11:15:00Z","maximum":0.0},
                        {"timeStamp":"2024-05-01T11:30:00Z","maximum":3.5},
                        {"timeStamp":"2024-05-01T11:45:00Z"}
                    ]}]}]}"#,
            )
            .create_async()
            .await;

        let query = MonitorMetricsQuery::new(rest_client(&server.url()));
        let samples = query
            .query_max_metric(
                &resource(),
                "cpu_metric",
                Duration::from_secs(45 * 60),
                Duration::from_secs(15 * 60),
            )
            .await
            .unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].maximum, Some(0.0));
        assert_eq!(samples[1].maximum, Some(3.5));
        assert_eq!(samples[2].maximum, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_query_max_metric_empty_response() {
        let mut server = mockito::Server::new_async().await;
        let path = format!(
            "{}/providers/microsoft.insights/metrics",
            resource().arm_path()
        );
        let _mock = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"value":[]}"#)
            .create_async()
            .await;

        let query = MonitorMetricsQuery::new(rest_client(&server.url()));
        let samples = query
            .query_max_metric(
                &resource(),
                "cpu_metric",
                Duration::from_secs(45 * 60),
                Duration::from_secs(15 * 60),
            )
            .await
            .unwrap();

        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn test_query_max_metric_bad_request() {
        let mut server = mockito::Server::new_async().await;
        let path = format!(
            "{}/providers/microsoft.insights/metrics",
            resource().arm_path()
        );
        let _mock = server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":"BadRequest","message":"Failed to find metric configuration"}"#)
            .create_async()
            .await;

        let query = MonitorMetricsQuery::new(rest_client(&server.url()));
        let err = query
            .query_max_metric(
                &resource(),
                "no_such_metric",
                Duration::from_secs(45 * 60),
                Duration::from_secs(15 * 60),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Status { status: 400, ref body } if body.contains("metric")));
    }
}
