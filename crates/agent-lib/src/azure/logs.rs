//! Activity history via resource-scoped Log Analytics queries

use super::resource::CapacityResourceId;
use super::rest::{iso8601_duration, RestClient};
use super::ActivityLog;
use crate::error::ClientError;
use crate::models::{ActivityRecord, OperationKind, OperationOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    timespan: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    tables: Vec<QueryTable>,
}

#[derive(Debug, Deserialize)]
struct QueryTable {
    columns: Vec<QueryColumn>,
    rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct QueryColumn {
    name: String,
}

impl QueryTable {
    fn column(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// KQL selecting operations of one kind and outcome from `AzureActivity`
pub fn activity_query(kind: &OperationKind, outcome: &OperationOutcome) -> String {
    format!(
        "AzureActivity \
         | where ActivityStatusValue == '{}' and OperationNameValue == '{}' \
         | project TimeGenerated, OperationNameValue, ActivityStatusValue, Caller",
        outcome.status_value(),
        CapacityResourceId::operation_name(kind.action_segment()),
    )
}

/// Every returned row matched the query's filters, so a row is kept even
/// when its cells are null; the filtered kind and outcome stand in for them.
fn parse_rows(
    table: &QueryTable,
    kind: &OperationKind,
    outcome: &OperationOutcome,
) -> Result<Vec<ActivityRecord>, ClientError> {
    let missing = |name: &str| ClientError::Decode(format!("activity result lacks column {}", name));
    let time_col = table.column("TimeGenerated").ok_or_else(|| missing("TimeGenerated"))?;
    let op_col = table
        .column("OperationNameValue")
        .ok_or_else(|| missing("OperationNameValue"))?;
    let status_col = table
        .column("ActivityStatusValue")
        .ok_or_else(|| missing("ActivityStatusValue"))?;
    let caller_col = table.column("Caller");

    let text = |row: &[serde_json::Value], idx: usize| {
        row.get(idx).and_then(|v| v.as_str()).map(str::to_string)
    };

    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let timestamp = match text(row, time_col) {
            Some(raw_time) => Some(
                DateTime::parse_from_rfc3339(&raw_time)
                    .map_err(|e| {
                        ClientError::Decode(format!("bad TimeGenerated '{}': {}", raw_time, e))
                    })?
                    .with_timezone(&Utc),
            ),
            None => {
                warn!("Activity row has no timestamp, counting it anyway");
                None
            }
        };

        records.push(ActivityRecord {
            timestamp,
            operation: text(row, op_col)
                .map(|name| OperationKind::from_operation_name(&name))
                .unwrap_or_else(|| kind.clone()),
            outcome: text(row, status_col)
                .map(|status| OperationOutcome::from_status(&status))
                .unwrap_or_else(|| outcome.clone()),
            initiator: caller_col.and_then(|idx| text(row, idx)),
        });
    }

    Ok(records)
}

/// Log Analytics implementation of [`ActivityLog`]
pub struct LogAnalyticsActivityLog {
    rest: RestClient,
}

impl LogAnalyticsActivityLog {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ActivityLog for LogAnalyticsActivityLog {
    async fn query_recent_operations(
        &self,
        resource: &CapacityResourceId,
        kind: OperationKind,
        outcome: OperationOutcome,
        window: Duration,
    ) -> Result<Vec<ActivityRecord>, ClientError> {
        let query = activity_query(&kind, &outcome);
        let url = self
            .rest
            .url(&format!("/v1{}/query", resource.arm_path()), &[])?;
        let body = QueryBody {
            query: &query,
            timespan: iso8601_duration(window),
        };

        let response: QueryResponse = self.rest.post_json(url, &body).await?;

        let mut records = Vec::new();
        for table in &response.tables {
            records.extend(parse_rows(table, &kind, &outcome)?);
        }

        debug!(
            resource_id = %resource,
            operation = %kind.action_segment(),
            count = records.len(),
            "Activity log query returned"
        );
        Ok(records)
    }
}
